//! Bundle Building
//!
//! Gathers the pieces of one evaluation into a [`ResultBundle`].
//!
//! ## Pipeline
//!
//! ```text
//! AssayTables + MetadataTable + side tables + failures
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │  empty MetricSlot   │  one per channel
//!   └──────────┬──────────┘
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │     BundleMeta      │  version, timestamp, run settings
//!   └──────────┬──────────┘
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │    ResultBundle     │  Ready for JSON/CSV/human output
//!   └─────────────────────┘
//! ```

use super::execution::EvaluationFailure;
use benchdesign_report::{
    AssayTable, BundleMeta, FailureInfo, GroundTruth, MetadataTable, MetricSlot, ResultBundle,
    RunConfig, SCHEMA_VERSION, Table,
};
use chrono::Utc;

/// Everything an evaluation produced, before packaging
pub struct BundleParts {
    pub assays: Vec<AssayTable>,
    pub metadata: MetadataTable,
    pub ground_truth: Option<GroundTruth>,
    pub features: Option<Table>,
    pub failures: Vec<EvaluationFailure>,
    pub config: RunConfig,
    pub duration_ms: f64,
}

/// Package the results of one evaluation.
pub fn build_bundle(parts: BundleParts) -> ResultBundle {
    let channels: Vec<String> = parts.assays.iter().map(|a| a.channel.clone()).collect();
    let metrics = channels
        .iter()
        .map(|c| (c.clone(), MetricSlot::default()))
        .collect();

    let failures = parts
        .failures
        .into_iter()
        .map(|f| FailureInfo {
            method: f.label,
            kind: f.stage.as_str().to_string(),
            message: f.message,
        })
        .collect();

    ResultBundle {
        meta: BundleMeta {
            schema_version: SCHEMA_VERSION,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            duration_ms: parts.duration_ms,
            channels,
            methods: parts.metadata.labels(),
            failures,
            config: parts.config,
        },
        assays: parts.assays,
        metadata: parts.metadata,
        metrics,
        ground_truth: parts.ground_truth,
        features: parts.features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::execution::FailureStage;
    use benchdesign_logic::Scalar;

    #[test]
    fn test_bundle_has_slot_per_channel() {
        let assay = |c: &str| AssayTable {
            channel: c.to_string(),
            table: Table::new(vec!["m1".to_string()], vec![vec![Scalar::Missing]], None),
        };
        let bundle = build_bundle(BundleParts {
            assays: vec![assay("x"), assay("y")],
            metadata: MetadataTable {
                columns: vec!["label".to_string()],
                rows: vec![vec![Scalar::from("m1")]],
            },
            ground_truth: None,
            features: None,
            failures: vec![EvaluationFailure {
                label: "m1".to_string(),
                stage: FailureStage::Panic,
                message: "boom".to_string(),
            }],
            config: RunConfig {
                concurrent: false,
                workers: 1,
                alignment: "off".to_string(),
                tabular_parameters: false,
            },
            duration_ms: 1.0,
        });
        assert_eq!(bundle.meta.channels, vec!["x", "y"]);
        assert_eq!(bundle.metrics.len(), 2);
        assert!(bundle.metrics["x"].is_empty());
        assert_eq!(bundle.meta.methods, vec!["m1"]);
        assert!(bundle.failed("m1"));
        assert_eq!(bundle.meta.failures[0].kind, "panic");
    }
}
