//! Method Specifications
//!
//! A method is a labelled primary callable, its deferred parameters, an
//! optional post-processing step and free-form metadata.

use crate::registry::DefinitionError;
use benchdesign_logic::{DeferredExpr, Provenance};
use serde_json::Value as JsonValue;
use std::fmt;

/// Names with special meaning in a [`MethodUpdate`]; not usable as parameters.
pub const RESERVED_KEYS: &[&str] = &["primary", "post", "meta"];

/// Channel name used when a method has no named output channels
pub const DEFAULT_CHANNEL: &str = "default";

/// Post-processing applied to the primary result
#[derive(Debug, Clone, Default)]
pub enum PostSpec {
    /// Primary result passes through
    #[default]
    None,
    /// One callable applied to the primary result
    Single(DeferredExpr),
    /// One callable per named channel, each applied to the same primary result
    Multi(Vec<(String, DeferredExpr)>),
}

/// Shape of a [`PostSpec`], ignoring its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostShape {
    /// No post-processing
    None,
    /// A single callable
    Single,
    /// Named channels
    Multi,
}

impl fmt::Display for PostShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostShape::None => write!(f, "none"),
            PostShape::Single => write!(f, "single"),
            PostShape::Multi => write!(f, "multi"),
        }
    }
}

impl PostSpec {
    /// Build a multi-channel post-processing step
    pub fn multi<N: Into<String>>(channels: impl IntoIterator<Item = (N, DeferredExpr)>) -> Self {
        PostSpec::Multi(channels.into_iter().map(|(n, e)| (n.into(), e)).collect())
    }

    /// Shape tag
    pub fn shape(&self) -> PostShape {
        match self {
            PostSpec::None => PostShape::None,
            PostSpec::Single(_) => PostShape::Single,
            PostSpec::Multi(_) => PostShape::Multi,
        }
    }

    /// Output channel names. Non-multi specs have the single default channel.
    pub fn channel_names(&self) -> Vec<&str> {
        match self {
            PostSpec::Multi(channels) => channels.iter().map(|(n, _)| n.as_str()).collect(),
            _ => vec![DEFAULT_CHANNEL],
        }
    }

    /// Descriptor for metadata: callable source, or the channel list
    pub fn descriptor(&self) -> Option<String> {
        match self {
            PostSpec::None => None,
            PostSpec::Single(expr) => Some(expr.source_text()),
            PostSpec::Multi(channels) => Some(
                channels
                    .iter()
                    .map(|(n, _)| n.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}

/// Explicit provenance supplied at definition time
#[derive(Debug, Clone)]
pub enum ProvenanceOverride {
    /// Name and version given directly
    Explicit(Provenance),
    /// A callable whose provenance is reported instead of the primary's
    Probe(DeferredExpr),
}

/// Method metadata
#[derive(Debug, Clone, Default)]
pub struct MethodMeta {
    /// Provenance override, taking priority over the primary callable's
    pub provenance: Option<ProvenanceOverride>,
    /// Free-form entries, in insertion order
    pub entries: Vec<(String, JsonValue)>,
}

impl MethodMeta {
    /// Empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit provenance
    pub fn with_provenance(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.provenance = Some(ProvenanceOverride::Explicit(Provenance::new(name, version)));
        self
    }

    /// Provenance taken from a probe callable
    pub fn with_probe(mut self, probe: DeferredExpr) -> Self {
        self.provenance = Some(ProvenanceOverride::Probe(probe));
        self
    }

    /// Add or replace a free-form entry
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Free-form entry by key
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A labelled method definition
#[derive(Debug, Clone)]
pub struct MethodSpec {
    /// Unique label within a registry
    pub label: String,
    /// Expression evaluating to the primary callable
    pub primary: DeferredExpr,
    /// Post-processing
    pub post: PostSpec,
    /// Deferred parameters, in declaration order
    pub params: Vec<(String, DeferredExpr)>,
    /// Metadata
    pub meta: MethodMeta,
}

impl MethodSpec {
    /// Method with no parameters, post-processing or metadata
    pub fn new(label: impl Into<String>, primary: impl Into<DeferredExpr>) -> Self {
        Self {
            label: label.into(),
            primary: primary.into(),
            post: PostSpec::None,
            params: Vec::new(),
            meta: MethodMeta::new(),
        }
    }

    /// Bind a parameter, replacing an earlier binding of the same name
    pub fn param(mut self, name: impl Into<String>, expr: impl Into<DeferredExpr>) -> Self {
        self.set_param(name.into(), expr.into());
        self
    }

    /// Set post-processing
    pub fn post(mut self, post: PostSpec) -> Self {
        self.post = post;
        self
    }

    /// Set metadata
    pub fn meta(mut self, meta: MethodMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Parameter by name
    pub fn get_param(&self, name: &str) -> Option<&DeferredExpr> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// Parameter names in declaration order
    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub(crate) fn set_param(&mut self, name: String, expr: DeferredExpr) {
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = expr,
            None => self.params.push((name, expr)),
        }
    }
}

/// Replacement fields for an existing method.
///
/// `primary`, `post` and `meta` replace the corresponding field wholesale;
/// parameters are merged or replace the parameter set, depending on how the
/// update is applied.
#[derive(Debug, Clone, Default)]
pub struct MethodUpdate {
    /// New primary expression
    pub primary: Option<DeferredExpr>,
    /// New post-processing
    pub post: Option<PostSpec>,
    /// New metadata
    pub meta: Option<MethodMeta>,
    /// Parameter assignments, in order
    pub params: Vec<(String, DeferredExpr)>,
}

impl MethodUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the primary expression
    pub fn primary(mut self, primary: impl Into<DeferredExpr>) -> Self {
        self.primary = Some(primary.into());
        self
    }

    /// Replace post-processing
    pub fn post(mut self, post: PostSpec) -> Self {
        self.post = Some(post);
        self
    }

    /// Replace metadata
    pub fn meta(mut self, meta: MethodMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Assign a parameter
    pub fn param(mut self, name: impl Into<String>, expr: impl Into<DeferredExpr>) -> Self {
        self.params.push((name.into(), expr.into()));
        self
    }

    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.post.is_none() && self.meta.is_none() && self.params.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), DefinitionError> {
        match self
            .params
            .iter()
            .find(|(n, _)| RESERVED_KEYS.contains(&n.as_str()))
        {
            Some((name, _)) => Err(DefinitionError::ReservedName(name.clone())),
            None => Ok(()),
        }
    }

    /// Apply to a copy of `spec`.
    ///
    /// With `overwrite_params` the given parameters become the whole parameter
    /// set; otherwise they replace matching names and append new ones.
    pub(crate) fn apply(&self, spec: &MethodSpec, overwrite_params: bool) -> MethodSpec {
        let mut out = spec.clone();
        if let Some(primary) = &self.primary {
            out.primary = primary.clone();
        }
        if let Some(post) = &self.post {
            out.post = post.clone();
        }
        if let Some(meta) = &self.meta {
            out.meta = meta.clone();
        }
        if overwrite_params {
            out.params.clear();
        }
        for (name, expr) in &self.params {
            out.set_param(name.clone(), expr.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> MethodSpec {
        MethodSpec::new("m1", DeferredExpr::symbol("identity"))
            .param("x", DeferredExpr::symbol("p"))
            .param("k", 2.0)
    }

    #[test]
    fn test_merge_keeps_unnamed_params() {
        let update = MethodUpdate::new().param("q", 5.0);
        let out = update.apply(&template(), false);
        assert_eq!(out.param_names(), vec!["x", "k", "q"]);
    }

    #[test]
    fn test_overwrite_drops_unnamed_params() {
        let update = MethodUpdate::new().param("k", 3.0);
        let out = update.apply(&template(), true);
        assert_eq!(out.param_names(), vec!["k"]);
        assert_eq!(out.get_param("k").unwrap().source_text(), "3");
    }

    #[test]
    fn test_reserved_names_rejected() {
        let update = MethodUpdate::new().param("post", 1.0);
        assert_eq!(
            update.validate(),
            Err(DefinitionError::ReservedName("post".to_string()))
        );
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(PostSpec::None.channel_names(), vec![DEFAULT_CHANNEL]);
        let multi = PostSpec::multi([
            ("x", DeferredExpr::symbol("abs")),
            ("y", DeferredExpr::symbol("neg")),
        ]);
        assert_eq!(multi.channel_names(), vec!["x", "y"]);
        assert_eq!(multi.descriptor().as_deref(), Some("x, y"));
        assert_eq!(multi.shape(), PostShape::Multi);
    }

    #[test]
    fn test_meta_entries_replace_by_key() {
        let meta = MethodMeta::new().with_entry("note", "a").with_entry("note", "b");
        assert_eq!(meta.entries.len(), 1);
        assert_eq!(meta.get("note"), Some(&JsonValue::from("b")));
    }
}
