#![warn(missing_docs)]
//! benchdesign Logic - Deferred Expression Engine
//!
//! Values, captured scopes, deferred expressions and callables. Deferred
//! expressions are resolved against a data context first and fall back to the
//! scope captured when they were defined. Formulas are evaluated element-wise
//! with evalexpr.

pub mod builtins;
mod callable;
mod context;
mod deferred;
mod scope;
mod value;

pub use callable::{
    Args, CallError, CallResult, Callable, Provenance, UNARY_ARG, map_numeric,
};
pub use context::{Formula, ResolveError};
pub use deferred::DeferredExpr;
pub use scope::{Lookup, Resolver, Scope};
pub use value::{Scalar, Value};
