//! Method Descriptions
//!
//! Plain-text rendering of registry contents for terminals and logs.

use crate::method::{MethodSpec, PostSpec, ProvenanceOverride};
use crate::registry::{DefinitionError, MethodRegistry};
use std::fmt::Write;

impl MethodRegistry {
    /// Describe one method.
    ///
    /// ```text
    /// m1
    ///   ├─ primary: identity
    ///   ├─ params:  x = p
    ///   ├─ post:    none
    ///   └─ meta:    provenance = stats 1.2
    /// ```
    pub fn describe_method(&self, label: &str) -> Result<String, DefinitionError> {
        self.get(label)
            .map(render)
            .ok_or_else(|| DefinitionError::UnknownLabel(label.to_string()))
    }

    /// Describe every method in registry order
    pub fn describe_all(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "MethodRegistry ({} method{}, {})",
            self.len(),
            if self.len() == 1 { "" } else { "s" },
            match self.dataset() {
                Some(ds) => format!("dataset with {} fields", ds.len()),
                None => "no dataset".to_string(),
            }
        );
        out.push_str(&"=".repeat(60));
        out.push('\n');
        for method in self.methods() {
            out.push_str(&render(method));
        }
        out
    }
}

fn render(method: &MethodSpec) -> String {
    let mut lines: Vec<(&str, String)> = vec![("primary", method.primary.source_text())];

    let params = method
        .params
        .iter()
        .map(|(name, expr)| format!("{name} = {}", expr.source_text()))
        .collect::<Vec<_>>();
    lines.push((
        "params",
        if params.is_empty() {
            "-".to_string()
        } else {
            params.join(", ")
        },
    ));

    lines.push((
        "post",
        match &method.post {
            PostSpec::None => "none".to_string(),
            PostSpec::Single(expr) => expr.source_text(),
            PostSpec::Multi(channels) => channels
                .iter()
                .map(|(name, expr)| format!("{name}: {}", expr.source_text()))
                .collect::<Vec<_>>()
                .join(", "),
        },
    ));

    let mut meta = Vec::new();
    match &method.meta.provenance {
        Some(ProvenanceOverride::Explicit(p)) => meta.push(format!("provenance = {p}")),
        Some(ProvenanceOverride::Probe(expr)) => {
            meta.push(format!("provenance probe = {}", expr.source_text()))
        }
        None => {}
    }
    meta.extend(method.meta.entries.iter().map(|(k, v)| format!("{k} = {v}")));
    if !meta.is_empty() {
        lines.push(("meta", meta.join(", ")));
    }

    let mut out = format!("{}\n", method.label);
    let last = lines.len() - 1;
    for (i, (key, text)) in lines.into_iter().enumerate() {
        let branch = if i == last { "└─" } else { "├─" };
        let _ = writeln!(out, "  {branch} {:<8} {text}", format!("{key}:"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodMeta;
    use benchdesign_logic::DeferredExpr;

    fn registry() -> MethodRegistry {
        MethodRegistry::new(None)
            .add_method(
                MethodSpec::new("m1", DeferredExpr::symbol("identity"))
                    .param("x", DeferredExpr::symbol("p"))
                    .meta(MethodMeta::new().with_provenance("stats", "1.2")),
            )
            .unwrap()
            .add_method(
                MethodSpec::new("m2", DeferredExpr::formula("x * 2"))
                    .post(PostSpec::Single(DeferredExpr::symbol("abs"))),
            )
            .unwrap()
    }

    #[test]
    fn test_describe_method() {
        let text = registry().describe_method("m1").unwrap();
        assert!(text.starts_with("m1\n"));
        assert!(text.contains("primary: identity"));
        assert!(text.contains("x = p"));
        assert!(text.contains("provenance = stats 1.2"));
        assert!(text.lines().last().unwrap().contains("└─"));
    }

    #[test]
    fn test_describe_unknown() {
        assert_eq!(
            registry().describe_method("nope"),
            Err(DefinitionError::UnknownLabel("nope".to_string()))
        );
    }

    #[test]
    fn test_describe_all_keeps_order() {
        let text = registry().describe_all();
        assert!(text.starts_with("MethodRegistry (2 methods, no dataset)"));
        let m1 = text.find("\nm1\n").unwrap();
        let m2 = text.find("\nm2\n").unwrap();
        assert!(m1 < m2);
        assert!(text.contains("post:    abs"));
    }
}
