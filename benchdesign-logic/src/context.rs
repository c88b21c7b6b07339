//! Formula Context
//!
//! Binds resolved values into evalexpr contexts and evaluates formulas.
//! Vector operands are evaluated element-wise; scalars are broadcast.
//! A missing operand makes the corresponding element missing.

use crate::value::{Scalar, Value};
use evalexpr::{
    ContextWithMutableVariables, EvalexprError, HashMapContext, Node, Value as ExprValue,
    build_operator_tree,
};
use thiserror::Error;

/// Errors from resolving deferred expressions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("syntax error in '{expression}': {message}")]
    Syntax { expression: String, message: String },

    #[error("length mismatch in '{expression}': '{name}' has {got} elements, expected {expected}")]
    LengthMismatch {
        expression: String,
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("'{name}' is a {kind} and cannot be used in a formula")]
    UnsupportedOperand { name: String, kind: &'static str },

    #[error("'{0}' does not evaluate to a function")]
    NotCallable(String),

    #[error("evaluation error: {0}")]
    Eval(String),

    #[error("call failed: {0}")]
    Call(String),
}

impl From<EvalexprError> for ResolveError {
    fn from(e: EvalexprError) -> Self {
        ResolveError::Eval(e.to_string())
    }
}

/// A parsed formula
#[derive(Debug, Clone)]
pub struct Formula {
    text: String,
    node: Node,
}

/// One bound identifier
enum Operand<'v> {
    Cell(&'v Scalar),
    Column(&'v [Scalar]),
}

impl Formula {
    /// Parse a formula
    pub fn parse(text: &str) -> Result<Self, ResolveError> {
        let node = build_operator_tree(text).map_err(|e| ResolveError::Syntax {
            expression: text.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            text: text.to_string(),
            node,
        })
    }

    /// Source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Variables read by the formula, first occurrence order, without duplicates
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for ident in self.node.iter_variable_identifiers() {
            if !names.iter().any(|n| n == ident) {
                names.push(ident.to_string());
            }
        }
        names
    }

    /// Evaluate, looking identifiers up through `lookup`.
    pub fn evaluate<'v>(
        &self,
        lookup: impl Fn(&str) -> Option<&'v Value>,
    ) -> Result<Value, ResolveError> {
        let mut operands: Vec<(String, Operand<'v>)> = Vec::new();
        let mut length: Option<(String, usize)> = None;

        for name in self.variables() {
            let value =
                lookup(&name).ok_or_else(|| ResolveError::UnknownIdentifier(name.clone()))?;
            let operand = match value {
                Value::Scalar(s) => Operand::Cell(s),
                Value::Vector(v) => {
                    match &length {
                        Some((_, expected)) if *expected != v.len() => {
                            return Err(ResolveError::LengthMismatch {
                                expression: self.text.clone(),
                                name,
                                expected: *expected,
                                got: v.len(),
                            });
                        }
                        Some(_) => {}
                        None => length = Some((name.clone(), v.len())),
                    }
                    Operand::Column(v.as_slice())
                }
                other => {
                    return Err(ResolveError::UnsupportedOperand {
                        name,
                        kind: other.kind(),
                    });
                }
            };
            operands.push((name, operand));
        }

        match length {
            None => Ok(Value::Scalar(self.eval_row(&operands, 0)?)),
            Some((_, n)) => {
                let cells = (0..n)
                    .map(|i| self.eval_row(&operands, i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Vector(cells))
            }
        }
    }

    fn eval_row(&self, operands: &[(String, Operand<'_>)], row: usize) -> Result<Scalar, ResolveError> {
        // evalexpr refuses to retype a variable, so each row gets a fresh context
        let mut ctx = HashMapContext::new();
        for (name, operand) in operands {
            let cell = match operand {
                Operand::Cell(s) => *s,
                Operand::Column(col) => &col[row],
            };
            if cell.is_missing() {
                return Ok(Scalar::Missing);
            }
            ctx.set_value(name.clone(), to_expr(cell))?;
        }

        let result = self.node.eval_with_context(&ctx)?;
        from_expr(result)
    }
}

fn to_expr(cell: &Scalar) -> ExprValue {
    match cell {
        Scalar::Missing => ExprValue::Empty,
        Scalar::Bool(b) => ExprValue::Boolean(*b),
        Scalar::Number(v) => ExprValue::Float(*v),
        Scalar::Text(s) => ExprValue::String(s.clone()),
    }
}

fn from_expr(value: ExprValue) -> Result<Scalar, ResolveError> {
    match value {
        ExprValue::Float(f) => Ok(Scalar::Number(f)),
        ExprValue::Int(i) => Ok(Scalar::Number(i as f64)),
        ExprValue::Boolean(b) => Ok(Scalar::Bool(b)),
        ExprValue::String(s) => Ok(Scalar::Text(s)),
        ExprValue::Empty => Ok(Scalar::Missing),
        other => Err(ResolveError::Eval(format!(
            "expected a single cell, got {:?}",
            other
        ))),
    }
}
