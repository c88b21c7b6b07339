//! Method Metadata
//!
//! Builds the metadata table: one row per method, in registry order,
//! independent of how evaluation went.
//!
//! ## Columns
//!
//! - **label**, **func**: method label and primary callable (its name when
//!   it has one, otherwise the expression text)
//! - **post**: post-processing callable, or the channel list
//! - **pkg_name**, **pkg_vers**, **provenance**: where the primary callable
//!   comes from, and which source said so (`manual`, `probe`, `callable`
//!   or `unknown`)
//! - parameters: one `param.<name>` column each, or a single `params` column
//! - free-form `meta` entries, prefixed with `meta.` if they collide with
//!   any of the above

use benchdesign_core::{MethodSpec, ProvenanceOverride, json_to_scalar};
use benchdesign_logic::{Provenance, Scalar};
use benchdesign_report::MetadataTable;

const FIXED_COLUMNS: &[&str] = &["label", "func", "post", "pkg_name", "pkg_vers", "provenance"];
const PARAMS_COLUMN: &str = "params";
const PARAM_PREFIX: &str = "param.";
const META_PREFIX: &str = "meta.";

/// Where a method's provenance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvenanceSource {
    /// Explicit name and version in the method's metadata
    Manual,
    /// A probe callable named in the method's metadata
    Probe,
    /// The primary callable's own provenance
    Callable,
    /// Nothing known
    Unknown,
}

impl ProvenanceSource {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ProvenanceSource::Manual => "manual",
            ProvenanceSource::Probe => "probe",
            ProvenanceSource::Callable => "callable",
            ProvenanceSource::Unknown => "unknown",
        }
    }
}

/// Provenance by priority: explicit override, probe, primary callable, unknown.
pub fn resolve_provenance(method: &MethodSpec) -> (Option<Provenance>, ProvenanceSource) {
    match &method.meta.provenance {
        Some(ProvenanceOverride::Explicit(p)) => return (Some(p.clone()), ProvenanceSource::Manual),
        Some(ProvenanceOverride::Probe(probe)) => {
            if let Some(p) = probe.peek_callable().and_then(|c| c.provenance().cloned()) {
                return (Some(p), ProvenanceSource::Probe);
            }
        }
        None => {}
    }
    match method.primary.peek_callable() {
        Some(c) if !c.is_anonymous() => match c.provenance() {
            Some(p) => (Some(p.clone()), ProvenanceSource::Callable),
            None => (None, ProvenanceSource::Unknown),
        },
        _ => (None, ProvenanceSource::Unknown),
    }
}

/// Primary callable as shown in the `func` column
pub fn render_func(method: &MethodSpec) -> String {
    method
        .primary
        .peek_callable()
        .and_then(|c| c.name().map(str::to_string))
        .unwrap_or_else(|| method.primary.source_text())
}

/// Build the metadata table for `methods`.
///
/// With `tabular_parameters` each parameter gets its own column; otherwise
/// all parameters are rendered into one `name=text, ...` column.
pub fn build_metadata(methods: &[MethodSpec], tabular_parameters: bool) -> MetadataTable {
    let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();

    let param_columns: Vec<String> = if tabular_parameters {
        let mut names: Vec<&str> = Vec::new();
        for method in methods {
            for name in method.param_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names.iter().map(|n| format!("{PARAM_PREFIX}{n}")).collect()
    } else {
        vec![PARAMS_COLUMN.to_string()]
    };
    columns.extend(param_columns.iter().cloned());

    // free-form entries: first-appearance order, flat values only
    let mut meta_keys: Vec<&str> = Vec::new();
    for method in methods {
        for (key, value) in &method.meta.entries {
            if json_to_scalar(value).is_none() {
                tracing::warn!(
                    method = %method.label,
                    key = %key,
                    "dropping metadata entry that is not a flat value"
                );
                continue;
            }
            if !meta_keys.contains(&key.as_str()) {
                meta_keys.push(key.as_str());
            }
        }
    }
    // a clashing key is prefixed until its column name is unique
    for key in &meta_keys {
        let mut name = key.to_string();
        while columns.contains(&name) {
            name = format!("{META_PREFIX}{name}");
        }
        columns.push(name);
    }

    let rows = methods
        .iter()
        .map(|method| {
            let (provenance, source) = resolve_provenance(method);
            let mut row = vec![
                Scalar::from(method.label.as_str()),
                Scalar::from(render_func(method)),
                method.post.descriptor().map(Scalar::from).unwrap_or_default(),
                provenance
                    .as_ref()
                    .map(|p| Scalar::from(p.name.as_str()))
                    .unwrap_or_default(),
                provenance
                    .as_ref()
                    .and_then(|p| p.version.as_deref())
                    .map(Scalar::from)
                    .unwrap_or_default(),
                Scalar::from(source.as_str()),
            ];

            if tabular_parameters {
                for column in &param_columns {
                    let name = &column[PARAM_PREFIX.len()..];
                    row.push(
                        method
                            .get_param(name)
                            .map(|e| Scalar::from(e.source_text()))
                            .unwrap_or_default(),
                    );
                }
            } else {
                let rendered = method
                    .params
                    .iter()
                    .map(|(name, expr)| format!("{name}={}", expr.source_text()))
                    .collect::<Vec<_>>()
                    .join(", ");
                row.push(Scalar::from(rendered));
            }

            for key in &meta_keys {
                row.push(
                    method
                        .meta
                        .get(key)
                        .and_then(json_to_scalar)
                        .unwrap_or_default(),
                );
            }
            row
        })
        .collect();

    MetadataTable { columns, rows }
}
