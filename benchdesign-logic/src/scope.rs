//! Captured Scopes
//!
//! A `Scope` is the set of bindings visible when a method was defined.
//! Resolution consults the dataset first and falls back to the scope.

use crate::context::ResolveError;
use crate::value::Value;
use fxhash::FxHashMap;
use std::sync::Arc;

/// Anything that can answer identifier lookups
pub trait Lookup {
    /// Value bound to `name`, if any
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Lookup for FxHashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Immutable bindings captured at definition time. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: Arc<FxHashMap<String, Value>>,
}

impl Scope {
    /// Empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope with one more binding
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.bindings).insert(name.into(), value.into());
        self
    }

    /// Value bound to `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the scope is empty
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Lookup for Scope {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Two-level lookup: data fields first, then the captured scope
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    data: Option<&'a dyn Lookup>,
    scope: &'a Scope,
}

impl<'a> Resolver<'a> {
    /// Resolver over a data context and a captured scope
    pub fn new(data: Option<&'a dyn Lookup>, scope: &'a Scope) -> Self {
        Self { data, scope }
    }

    /// Look `name` up in the data, then in the scope
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        self.data
            .and_then(|d| d.lookup(name))
            .or_else(|| self.scope.get(name))
    }

    /// Like [`Resolver::lookup`] but failing on unknown identifiers
    pub fn require(&self, name: &str) -> Result<&'a Value, ResolveError> {
        self.lookup(name)
            .ok_or_else(|| ResolveError::UnknownIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_shadows_scope() {
        let mut data: FxHashMap<String, Value> = FxHashMap::default();
        data.insert("p".to_string(), Value::from(1.0));
        let scope = Scope::new().with("p", 2.0).with("k", 3.0);

        let r = Resolver::new(Some(&data), &scope);
        assert_eq!(r.lookup("p"), Some(&Value::from(1.0)));
        assert_eq!(r.lookup("k"), Some(&Value::from(3.0)));
        assert!(r.require("missing").is_err());
    }

    #[test]
    fn test_scope_is_copy_on_write() {
        let base = Scope::new().with("a", 1.0);
        let extended = base.clone().with("b", 2.0);
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }
}
