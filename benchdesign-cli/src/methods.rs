//! Method definition files
//!
//! Methods can be declared in TOML so the CLI can evaluate them without any
//! Rust code:
//!
//! ```toml
//! [[method]]
//! label = "bonf"
//! func = "bonferroni"
//! params = { x = "p" }
//!
//! [[method]]
//! label = "scaled"
//! func = "x * k"
//! post = "rank"
//! [method.params]
//! x = "p"
//! k = 10
//! [method.meta]
//! pkg_name = "mylib"
//! pkg_vers = "1.2"
//! note = "hand-tuned"
//! ```
//!
//! `func` and post-processing callables are either built-in names or formula
//! text whose free identifiers bind to the method's parameters. Parameter
//! values are dataset field names, formula text over the dataset, or literal
//! numbers and booleans. Everything is captured against the built-in scope.

use anyhow::{Context, bail};
use benchdesign_core::{MethodMeta, MethodRegistry, MethodSpec, PostSpec, ProvenanceOverride};
use benchdesign_logic::{Callable, DeferredExpr, Provenance, Scope, Value, builtins};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct MethodFile {
    #[serde(default, rename = "method")]
    methods: Vec<MethodEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MethodEntry {
    label: String,
    func: String,
    #[serde(default)]
    params: toml::Table,
    #[serde(default)]
    post: Option<PostEntry>,
    #[serde(default)]
    meta: toml::Table,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PostEntry {
    Single(String),
    Channels(toml::Table),
}

/// Load a method file into a registry without a dataset
pub fn load_methods(path: impl AsRef<Path>) -> anyhow::Result<MethodRegistry> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read method file {}", path.display()))?;
    parse_methods(&content).with_context(|| format!("invalid method file {}", path.display()))
}

/// Parse method definitions from TOML text
pub fn parse_methods(content: &str) -> anyhow::Result<MethodRegistry> {
    let file: MethodFile = toml::from_str(content)?;
    let scope = builtins::scope();
    let ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")?;

    let mut registry = MethodRegistry::new(None);
    for entry in file.methods {
        let label = entry.label.clone();
        let spec = build_method(entry, &scope, &ident)
            .with_context(|| format!("method '{label}'"))?;
        registry = registry.add_method(spec)?;
    }
    tracing::debug!(methods = registry.len(), "loaded method definitions");
    Ok(registry)
}

fn build_method(entry: MethodEntry, scope: &Scope, ident: &Regex) -> anyhow::Result<MethodSpec> {
    let mut spec = MethodSpec::new(entry.label, callable_expr(&entry.func, scope)?);

    for (name, value) in &entry.params {
        spec = spec.param(name.as_str(), param_expr(name, value, scope, ident)?);
    }

    spec = match entry.post {
        None => spec,
        Some(PostEntry::Single(text)) => spec.post(PostSpec::Single(callable_expr(&text, scope)?)),
        Some(PostEntry::Channels(channels)) => {
            let mut parsed = Vec::with_capacity(channels.len());
            for (channel, value) in &channels {
                let Some(text) = value.as_str() else {
                    bail!("post-processing for channel '{channel}' must be a string");
                };
                parsed.push((channel.clone(), callable_expr(text, scope)?));
            }
            spec.post(PostSpec::multi(parsed))
        }
    };

    if !entry.meta.is_empty() {
        spec = spec.meta(build_meta(&entry.meta, scope)?);
    }
    Ok(spec)
}

/// Built-in name, or formula text turned into an anonymous callable
fn callable_expr(text: &str, scope: &Scope) -> anyhow::Result<DeferredExpr> {
    let text = text.trim();
    if text.is_empty() {
        bail!("callable text is empty");
    }
    if scope.get(text).and_then(Value::as_callable).is_some() {
        return Ok(DeferredExpr::symbol(text).capture(scope));
    }
    let callable = Callable::formula(text)?;
    Ok(DeferredExpr::callable(callable).capture(scope))
}

fn param_expr(
    name: &str,
    value: &toml::Value,
    scope: &Scope,
    ident: &Regex,
) -> anyhow::Result<DeferredExpr> {
    let expr = match value {
        toml::Value::String(text) if ident.is_match(text.trim()) => {
            DeferredExpr::symbol(text.trim())
        }
        toml::Value::String(text) => DeferredExpr::formula(text.trim()),
        toml::Value::Integer(i) => DeferredExpr::literal(*i as f64),
        toml::Value::Float(f) => DeferredExpr::literal(*f),
        toml::Value::Boolean(b) => DeferredExpr::literal(*b),
        toml::Value::Array(items) => {
            let numbers = items
                .iter()
                .map(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
                .collect::<Option<Vec<f64>>>()
                .with_context(|| format!("parameter '{name}': arrays must be numeric"))?;
            DeferredExpr::literal(Value::numbers(numbers))
        }
        other => bail!("parameter '{name}': unsupported value {other}"),
    };
    Ok(expr.capture(scope))
}

fn build_meta(table: &toml::Table, scope: &Scope) -> anyhow::Result<MethodMeta> {
    let mut meta = MethodMeta::new();

    let pkg_name = table.get("pkg_name").and_then(toml::Value::as_str);
    let pkg_vers = table.get("pkg_vers").and_then(toml::Value::as_str);
    match (pkg_name, pkg_vers) {
        (Some(name), Some(vers)) => meta = meta.with_provenance(name, vers),
        (Some(name), None) => {
            meta.provenance = Some(ProvenanceOverride::Explicit(Provenance::unversioned(name)))
        }
        (None, Some(_)) => bail!("pkg_vers given without pkg_name"),
        (None, None) => {
            if let Some(probe) = table.get("probe").and_then(toml::Value::as_str) {
                meta = meta.with_probe(callable_expr(probe, scope)?);
            }
        }
    }

    for (key, value) in table {
        if matches!(key.as_str(), "pkg_name" | "pkg_vers" | "probe") {
            continue;
        }
        meta = meta.with_entry(key.as_str(), serde_json::to_value(value)?);
    }
    Ok(meta)
}
