//! Method Registry
//!
//! Ordered collection of uniquely labelled methods, optionally bound to a
//! dataset. Every mutation leaves the receiver untouched and returns a new
//! registry.

use crate::dataset::Dataset;
use crate::method::{MethodSpec, MethodUpdate, RESERVED_KEYS};
use benchdesign_logic::DeferredExpr;
use thiserror::Error;

/// Errors from registry mutations
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum DefinitionError {
    /// No method with this label exists.
    #[error("method is not defined: '{0}'")]
    UnknownLabel(String),

    /// Variants given to `expand_method` do not have a usable shape.
    #[error("invalid variant specification: {0}")]
    InvalidVariantSpec(String),

    /// A label would appear twice.
    #[error("label collision: '{0}' is already defined")]
    LabelCollision(String),

    /// `primary`, `post` and `meta` cannot be parameter names in updates.
    #[error("'{0}' is reserved and cannot be used as a parameter name")]
    ReservedName(String),

    /// Labels must be non-empty.
    #[error("method label must not be empty")]
    EmptyLabel,
}

/// New methods derived from a template by `expand_method`
#[derive(Debug, Clone)]
pub enum Variants {
    /// Each variant replaces the value of one parameter
    Param {
        /// Parameter to vary
        param: String,
        /// `(new label, replacement value)` pairs
        values: Vec<(String, DeferredExpr)>,
    },
    /// Each variant is a full update applied to a copy of the template
    Updates(Vec<(String, MethodUpdate)>),
}

impl Variants {
    /// Vary one parameter
    pub fn param<L: Into<String>>(
        param: impl Into<String>,
        values: impl IntoIterator<Item = (L, DeferredExpr)>,
    ) -> Self {
        Variants::Param {
            param: param.into(),
            values: values.into_iter().map(|(l, e)| (l.into(), e)).collect(),
        }
    }

    /// Apply full updates
    pub fn updates<L: Into<String>>(updates: impl IntoIterator<Item = (L, MethodUpdate)>) -> Self {
        Variants::Updates(updates.into_iter().map(|(l, u)| (l.into(), u)).collect())
    }

    fn labels(&self) -> Vec<&str> {
        match self {
            Variants::Param { values, .. } => values.iter().map(|(l, _)| l.as_str()).collect(),
            Variants::Updates(updates) => updates.iter().map(|(l, _)| l.as_str()).collect(),
        }
    }

    fn into_updates(self) -> Result<Vec<(String, MethodUpdate)>, DefinitionError> {
        match self {
            Variants::Param { param, values } => {
                if param.trim().is_empty() {
                    return Err(DefinitionError::InvalidVariantSpec(
                        "parameter name must not be empty".to_string(),
                    ));
                }
                if RESERVED_KEYS.contains(&param.as_str()) {
                    return Err(DefinitionError::InvalidVariantSpec(format!(
                        "'{param}' is reserved; pass variants as full updates instead"
                    )));
                }
                Ok(values
                    .into_iter()
                    .map(|(label, value)| (label, MethodUpdate::new().param(param.clone(), value)))
                    .collect())
            }
            Variants::Updates(updates) => {
                if let Some((label, _)) = updates.iter().find(|(_, u)| u.is_empty()) {
                    return Err(DefinitionError::InvalidVariantSpec(format!(
                        "variant '{label}' does not change anything"
                    )));
                }
                Ok(updates)
            }
        }
    }
}

/// Ordered label → method mapping plus an optional default dataset
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    dataset: Option<Dataset>,
    methods: Vec<MethodSpec>,
}

impl MethodRegistry {
    /// Empty registry
    pub fn new(dataset: Option<Dataset>) -> Self {
        Self {
            dataset,
            methods: Vec::new(),
        }
    }

    /// Copy bound to a different dataset
    pub fn with_dataset(&self, dataset: Dataset) -> Self {
        Self {
            dataset: Some(dataset),
            methods: self.methods.clone(),
        }
    }

    /// Bound dataset, if any
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// Methods in insertion order
    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    /// Labels in insertion order
    pub fn labels(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.label.as_str()).collect()
    }

    /// Method by label
    pub fn get(&self, label: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.label == label)
    }

    /// Whether a label is defined
    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether no methods are defined
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.label == label)
    }

    fn require(&self, label: &str) -> Result<usize, DefinitionError> {
        self.position(label)
            .ok_or_else(|| DefinitionError::UnknownLabel(label.to_string()))
    }

    /// Append a method. The label must be new.
    pub fn add_method(&self, method: MethodSpec) -> Result<Self, DefinitionError> {
        if method.label.trim().is_empty() {
            return Err(DefinitionError::EmptyLabel);
        }
        if self.contains(&method.label) {
            return Err(DefinitionError::LabelCollision(method.label));
        }
        let mut next = self.clone();
        next.methods.push(method);
        Ok(next)
    }

    /// Replace fields of an existing method.
    ///
    /// Parameters in `update` are merged into the existing set, or replace it
    /// entirely when `overwrite_params` is set.
    pub fn modify_method(
        &self,
        label: &str,
        update: MethodUpdate,
        overwrite_params: bool,
    ) -> Result<Self, DefinitionError> {
        let idx = self.require(label)?;
        update.validate()?;
        let mut next = self.clone();
        next.methods[idx] = update.apply(&self.methods[idx], overwrite_params);
        Ok(next)
    }

    /// Derive new methods from the method `label`.
    ///
    /// New methods are appended in the order given. With `replace` the
    /// template is dropped, and a variant may then reuse the template's label.
    pub fn expand_method(
        &self,
        label: &str,
        variants: Variants,
        replace: bool,
    ) -> Result<Self, DefinitionError> {
        let idx = self.require(label)?;

        let new_labels = variants.labels();
        if new_labels.is_empty() {
            return Err(DefinitionError::InvalidVariantSpec(
                "no variants given".to_string(),
            ));
        }
        for (i, new_label) in new_labels.iter().enumerate() {
            if new_label.trim().is_empty() {
                return Err(DefinitionError::EmptyLabel);
            }
            if new_labels[..i].contains(new_label) {
                return Err(DefinitionError::LabelCollision(new_label.to_string()));
            }
            let reuses_template = *new_label == label && replace;
            if self.contains(new_label) && !reuses_template {
                return Err(DefinitionError::LabelCollision(new_label.to_string()));
            }
        }

        let updates = variants.into_updates()?;
        let template = &self.methods[idx];
        let mut derived = Vec::with_capacity(updates.len());
        for (new_label, update) in updates {
            update.validate()?;
            let mut method = update.apply(template, false);
            method.label = new_label;
            derived.push(method);
        }

        let mut next = self.clone();
        if replace {
            next.methods.remove(idx);
        }
        next.methods.extend(derived);
        Ok(next)
    }

    /// Remove exactly the method `label`
    pub fn drop_method(&self, label: &str) -> Result<Self, DefinitionError> {
        let idx = self.require(label)?;
        let mut next = self.clone();
        next.methods.remove(idx);
        Ok(next)
    }

    /// Keep only the methods whose label satisfies `keep`, in order
    pub fn retain(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self {
            dataset: self.dataset.clone(),
            methods: self
                .methods
                .iter()
                .filter(|m| keep(&m.label))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodMeta;

    fn registry() -> MethodRegistry {
        MethodRegistry::new(None)
            .add_method(
                MethodSpec::new("m1", DeferredExpr::symbol("identity"))
                    .param("x", DeferredExpr::symbol("p")),
            )
            .unwrap()
            .add_method(
                MethodSpec::new("m2", DeferredExpr::formula("x * 2"))
                    .param("x", DeferredExpr::symbol("p")),
            )
            .unwrap()
    }

    #[test]
    fn test_add_rejects_duplicate_label() {
        let r = registry();
        let err = r
            .add_method(MethodSpec::new("m1", DeferredExpr::symbol("abs")))
            .unwrap_err();
        assert_eq!(err, DefinitionError::LabelCollision("m1".to_string()));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_add_rejects_empty_label() {
        let err = registry()
            .add_method(MethodSpec::new("  ", DeferredExpr::symbol("abs")))
            .unwrap_err();
        assert_eq!(err, DefinitionError::EmptyLabel);
    }

    #[test]
    fn test_mutations_leave_receiver_untouched() {
        let r = registry();
        let dropped = r.drop_method("m1").unwrap();
        assert_eq!(r.labels(), vec!["m1", "m2"]);
        assert_eq!(dropped.labels(), vec!["m2"]);
    }

    #[test]
    fn test_drop_unknown_label() {
        let err = registry().drop_method("zzz").unwrap_err();
        assert!(err.to_string().contains("method is not defined"));
    }

    #[test]
    fn test_modify_replaces_meta_wholesale() {
        let r = registry()
            .modify_method(
                "m1",
                MethodUpdate::new().meta(MethodMeta::new().with_entry("note", "x")),
                false,
            )
            .unwrap();
        let r = r
            .modify_method(
                "m1",
                MethodUpdate::new().meta(MethodMeta::new().with_entry("other", 1)),
                false,
            )
            .unwrap();
        let meta = &r.get("m1").unwrap().meta;
        assert!(meta.get("note").is_none());
        assert!(meta.get("other").is_some());
    }

    #[test]
    fn test_modify_unknown_label() {
        let err = registry()
            .modify_method("nope", MethodUpdate::new().param("q", 1.0), false)
            .unwrap_err();
        assert_eq!(err, DefinitionError::UnknownLabel("nope".to_string()));
    }

    #[test]
    fn test_expand_keeps_template_by_default() {
        let r = registry()
            .expand_method(
                "m1",
                Variants::param(
                    "x",
                    [
                        ("m1a", DeferredExpr::formula("p / 2")),
                        ("m1b", DeferredExpr::formula("p * 10")),
                    ],
                ),
                false,
            )
            .unwrap();
        assert_eq!(r.labels(), vec!["m1", "m2", "m1a", "m1b"]);
        assert_eq!(r.get("m1a").unwrap().get_param("x").unwrap().source_text(), "p / 2");
    }

    #[test]
    fn test_expand_replace_may_reuse_template_label() {
        let r = registry()
            .expand_method(
                "m1",
                Variants::param("x", [("m1", DeferredExpr::formula("p + 1"))]),
                true,
            )
            .unwrap();
        assert_eq!(r.labels(), vec!["m2", "m1"]);
    }

    #[test]
    fn test_expand_label_collisions() {
        let r = registry();
        let dup = r.expand_method(
            "m1",
            Variants::param("x", [("a", 1.0.into()), ("a", 2.0.into())]),
            false,
        );
        assert_eq!(dup.unwrap_err(), DefinitionError::LabelCollision("a".to_string()));

        let existing = r.expand_method("m1", Variants::param("x", [("m2", 1.0.into())]), true);
        assert_eq!(
            existing.unwrap_err(),
            DefinitionError::LabelCollision("m2".to_string())
        );

        let template = r.expand_method("m1", Variants::param("x", [("m1", 1.0.into())]), false);
        assert_eq!(
            template.unwrap_err(),
            DefinitionError::LabelCollision("m1".to_string())
        );
    }

    #[test]
    fn test_expand_invalid_shapes() {
        let r = registry();
        let empty = r.expand_method("m1", Variants::Updates(Vec::new()), false);
        assert!(matches!(empty, Err(DefinitionError::InvalidVariantSpec(_))));

        let reserved = r.expand_method("m1", Variants::param("post", [("v", 1.0.into())]), false);
        assert!(matches!(reserved, Err(DefinitionError::InvalidVariantSpec(_))));

        let noop = r.expand_method("m1", Variants::updates([("v", MethodUpdate::new())]), false);
        assert!(matches!(noop, Err(DefinitionError::InvalidVariantSpec(_))));
    }

    #[test]
    fn test_expand_with_updates() {
        let r = registry()
            .expand_method(
                "m2",
                Variants::updates([(
                    "m2_abs",
                    MethodUpdate::new()
                        .primary(DeferredExpr::symbol("abs"))
                        .param("k", 3.0),
                )]),
                false,
            )
            .unwrap();
        let m = r.get("m2_abs").unwrap();
        assert_eq!(m.primary.source_text(), "abs");
        assert_eq!(m.param_names(), vec!["x", "k"]);
    }

    #[test]
    fn test_retain_keeps_order() {
        let r = registry().retain(|l| l != "m1");
        assert_eq!(r.labels(), vec!["m2"]);
    }
}
