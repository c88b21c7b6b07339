//! Callables
//!
//! A method's primary function and its post-processing steps are `Callable`s:
//! shared, thread-safe closures over named arguments, optionally carrying the
//! name of the library they come from.

use crate::context::{Formula, ResolveError};
use crate::value::{Scalar, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while invoking a callable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{argument}' must be {expected}, got {got}")]
    TypeMismatch {
        argument: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{0}")]
    Failed(String),
}

impl CallError {
    /// Free-form failure
    pub fn msg(message: impl fmt::Display) -> Self {
        CallError::Failed(message.to_string())
    }
}

impl From<ResolveError> for CallError {
    fn from(e: ResolveError) -> Self {
        CallError::Failed(e.to_string())
    }
}

/// Result of invoking a callable
pub type CallResult = Result<Value, CallError>;

/// Library a callable is defined in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Library name
    pub name: String,
    /// Library version, when known
    pub version: Option<String>,
}

impl Provenance {
    /// Provenance with a known version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Provenance without version information
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{} {}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Ordered, named call arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    entries: Vec<(String, Value)>,
}

/// Name given to the single argument of post-processing callables
pub const UNARY_ARG: &str = "x";

impl Args {
    /// Empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// A single argument named [`UNARY_ARG`]
    pub fn unary(value: Value) -> Self {
        Self::new().with(UNARY_ARG, value)
    }

    /// Append an argument, replacing an earlier one with the same name
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`Args::push`]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.push(name, value);
        self
    }

    /// Look up an argument by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// First argument in declaration order
    pub fn first(&self) -> Option<&Value> {
        self.entries.first().map(|(_, v)| v)
    }

    /// Look up a required argument
    pub fn require(&self, name: &str) -> Result<&Value, CallError> {
        self.get(name)
            .ok_or_else(|| CallError::MissingArgument(name.to_string()))
    }

    /// Numeric view of a required argument
    pub fn numbers(&self, name: &str) -> Result<Vec<f64>, CallError> {
        let value = self.require(name)?;
        value.to_numbers().ok_or(CallError::TypeMismatch {
            argument: name.to_string(),
            expected: "numeric",
            got: value.kind(),
        })
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no arguments
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type CallFn = dyn Fn(&Args) -> CallResult + Send + Sync;

/// A shareable function over named arguments
#[derive(Clone)]
pub struct Callable {
    name: Option<String>,
    source: Option<String>,
    provenance: Option<Provenance>,
    func: Arc<CallFn>,
}

impl Callable {
    /// Named callable
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Args) -> CallResult + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            source: None,
            provenance: None,
            func: Arc::new(func),
        }
    }

    /// Anonymous callable; `source` is the text shown in metadata
    pub fn anonymous<F>(source: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Args) -> CallResult + Send + Sync + 'static,
    {
        Self {
            name: None,
            source: Some(source.into()),
            provenance: None,
            func: Arc::new(func),
        }
    }

    /// Anonymous callable evaluating a formula; arguments bind by name.
    ///
    /// The formula is parsed once here so syntax errors surface at definition time.
    pub fn formula(text: impl Into<String>) -> Result<Self, ResolveError> {
        let text = text.into();
        Formula::parse(&text)?;
        let body = text.clone();
        Ok(Self::anonymous(text, move |args: &Args| {
            let formula = Formula::parse(&body)?;
            Ok(formula.evaluate(|name| args.get(name))?)
        }))
    }

    /// Attach the defining library
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Identifier, for named callables
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the callable has no name
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// Defining library, if recorded
    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Name if present, otherwise the literal source text
    pub fn source_text(&self) -> String {
        self.name
            .as_deref()
            .or(self.source.as_deref())
            .unwrap_or("<function>")
            .to_string()
    }

    /// Invoke with the given arguments
    pub fn call(&self, args: &Args) -> CallResult {
        (self.func)(args)
    }

    /// Invoke with a single argument
    pub fn call1(&self, value: Value) -> CallResult {
        self.call(&Args::unary(value))
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("source", &self.source_text())
            .field("provenance", &self.provenance)
            .finish()
    }
}

/// Apply `f` to every numeric cell, keeping the value's shape.
pub fn map_numeric(value: &Value, f: impl Fn(f64) -> f64) -> CallResult {
    let cell = |s: &Scalar| -> Result<Scalar, CallError> {
        match s {
            Scalar::Missing => Ok(Scalar::Missing),
            Scalar::Text(_) => Err(CallError::TypeMismatch {
                argument: UNARY_ARG.to_string(),
                expected: "numeric",
                got: "text",
            }),
            other => Ok(Scalar::Number(f(other.as_f64().unwrap_or(f64::NAN)))),
        }
    };
    match value {
        Value::Scalar(s) => Ok(Value::Scalar(cell(s)?)),
        Value::Vector(v) => Ok(Value::Vector(
            v.iter().map(cell).collect::<Result<_, _>>()?,
        )),
        Value::Keyed(v) => Ok(Value::Keyed(
            v.iter()
                .map(|(k, s)| Ok((k.clone(), cell(s)?)))
                .collect::<Result<_, CallError>>()?,
        )),
        Value::Function(_) => Err(CallError::TypeMismatch {
            argument: UNARY_ARG.to_string(),
            expected: "numeric",
            got: "function",
        }),
    }
}
