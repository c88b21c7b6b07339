//! Deferred Expressions
//!
//! An expression captured unevaluated together with the scope visible at
//! definition time. Nothing is looked up until [`DeferredExpr::resolve`] is
//! called with a data context.

use crate::callable::Callable;
use crate::context::{Formula, ResolveError};
use crate::scope::{Lookup, Resolver, Scope};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

type ThunkFn = dyn Fn(&Resolver<'_>) -> Result<Value, ResolveError> + Send + Sync;

#[derive(Clone)]
enum ExprKind {
    Literal(Value),
    Symbol(String),
    Formula(String),
    Thunk { source: String, func: Arc<ThunkFn> },
}

/// An expression plus its captured scope
#[derive(Clone)]
pub struct DeferredExpr {
    kind: ExprKind,
    scope: Scope,
}

impl DeferredExpr {
    fn from_kind(kind: ExprKind) -> Self {
        Self {
            kind,
            scope: Scope::new(),
        }
    }

    /// A constant
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::from_kind(ExprKind::Literal(value.into()))
    }

    /// A bare identifier
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::from_kind(ExprKind::Symbol(name.into()))
    }

    /// A formula, parsed when resolved
    pub fn formula(text: impl Into<String>) -> Self {
        Self::from_kind(ExprKind::Formula(text.into()))
    }

    /// A callable captured directly
    pub fn callable(callable: Callable) -> Self {
        Self::literal(Value::Function(callable))
    }

    /// Arbitrary Rust code over the resolver; `source` is shown in metadata
    pub fn thunk<F>(source: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Resolver<'_>) -> Result<Value, ResolveError> + Send + Sync + 'static,
    {
        Self::from_kind(ExprKind::Thunk {
            source: source.into(),
            func: Arc::new(func),
        })
    }

    /// Capture `scope` as the definition-time scope
    pub fn capture(mut self, scope: &Scope) -> Self {
        self.scope = scope.clone();
        self
    }

    /// The captured scope
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Bare identifier, if this expression is one
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Source text of the expression
    pub fn source_text(&self) -> String {
        match &self.kind {
            ExprKind::Literal(Value::Scalar(s)) => match s {
                crate::Scalar::Text(t) => format!("{t:?}"),
                other => other.to_string(),
            },
            ExprKind::Literal(other) => other.to_string(),
            ExprKind::Symbol(name) => name.clone(),
            ExprKind::Formula(text) => text.clone(),
            ExprKind::Thunk { source, .. } => source.clone(),
        }
    }

    /// Resolve against `data` (may be absent), falling back to the captured scope
    pub fn resolve(&self, data: Option<&dyn Lookup>) -> Result<Value, ResolveError> {
        let resolver = Resolver::new(data, &self.scope);
        self.resolve_with(&resolver)
    }

    fn resolve_with(&self, resolver: &Resolver<'_>) -> Result<Value, ResolveError> {
        match &self.kind {
            ExprKind::Literal(v) => Ok(v.clone()),
            ExprKind::Symbol(name) => resolver.require(name).cloned(),
            ExprKind::Formula(text) => {
                let formula = Formula::parse(text)?;
                formula.evaluate(|name| resolver.lookup(name))
            }
            ExprKind::Thunk { func, .. } => func(resolver),
        }
    }

    /// Resolve and require a callable
    pub fn resolve_callable(&self, data: Option<&dyn Lookup>) -> Result<Callable, ResolveError> {
        match self.resolve(data)? {
            Value::Function(c) => Ok(c),
            _ => Err(ResolveError::NotCallable(self.source_text())),
        }
    }

    /// Callable this expression names in its captured scope, without data.
    ///
    /// Used for metadata, where no dataset is available. Returns `None` for
    /// anything that is not a literal callable or a symbol bound to one.
    pub fn peek_callable(&self) -> Option<Callable> {
        match &self.kind {
            ExprKind::Literal(Value::Function(c)) => Some(c.clone()),
            ExprKind::Symbol(name) => self.scope.get(name)?.as_callable().cloned(),
            _ => None,
        }
    }
}

impl fmt::Debug for DeferredExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeferredExpr({})", self.source_text())
    }
}

impl From<Value> for DeferredExpr {
    fn from(v: Value) -> Self {
        DeferredExpr::literal(v)
    }
}

impl From<f64> for DeferredExpr {
    fn from(v: f64) -> Self {
        DeferredExpr::literal(v)
    }
}

impl From<Callable> for DeferredExpr {
    fn from(c: Callable) -> Self {
        DeferredExpr::callable(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Args;
    use fxhash::FxHashMap;

    fn data() -> FxHashMap<String, Value> {
        let mut d = FxHashMap::default();
        d.insert("p".to_string(), Value::numbers([0.01, 0.2, 0.05]));
        d
    }

    #[test]
    fn test_symbol_prefers_data_over_scope() {
        let scope = Scope::new().with("p", 99.0);
        let expr = DeferredExpr::symbol("p").capture(&scope);
        let d = data();
        assert_eq!(
            expr.resolve(Some(&d)).unwrap(),
            Value::numbers([0.01, 0.2, 0.05])
        );
        assert_eq!(expr.resolve(None).unwrap(), Value::from(99.0));
    }

    #[test]
    fn test_formula_mixes_data_and_scope() {
        let scope = Scope::new().with("k", 10.0);
        let expr = DeferredExpr::formula("p * k").capture(&scope);
        let d = data();
        let Value::Vector(cells) = expr.resolve(Some(&d)).unwrap() else {
            panic!("expected vector");
        };
        assert_eq!(cells.len(), 3);
        assert!((cells[1].as_f64().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_capture_happens_at_definition_time() {
        let scope = Scope::new().with("k", 1.0);
        let expr = DeferredExpr::formula("k + 1").capture(&scope);
        let _later = scope.with("k", 100.0);
        assert_eq!(expr.resolve(None).unwrap(), Value::from(2.0));
    }

    #[test]
    fn test_thunk_sees_resolver() {
        let expr = DeferredExpr::thunk("len(p)", |r: &Resolver<'_>| {
            Ok(Value::from(r.require("p")?.len() as f64))
        });
        let d = data();
        assert_eq!(expr.resolve(Some(&d)).unwrap(), Value::from(3.0));
    }

    #[test]
    fn test_peek_callable_through_symbol() {
        let id = Callable::new("identity", |a: &Args| {
            a.first().cloned().ok_or_else(|| crate::CallError::msg("no input"))
        });
        let scope = Scope::new().with("identity", id);
        let expr = DeferredExpr::symbol("identity").capture(&scope);
        assert_eq!(expr.peek_callable().unwrap().name(), Some("identity"));
        assert!(DeferredExpr::formula("x * 2").peek_callable().is_none());
    }

    #[test]
    fn test_not_callable() {
        let expr = DeferredExpr::literal(1.0);
        assert_eq!(
            expr.resolve_callable(None).unwrap_err(),
            ResolveError::NotCallable("1".to_string())
        );
    }
}
