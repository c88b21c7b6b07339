//! Configuration Checks
//!
//! Everything that can be rejected without running a method is rejected
//! here, before any task is dispatched. Each failing check has its own
//! [`ConfigurationError`] variant.

use crate::evaluate::{EvaluationOptions, GroundTruthSpec, IdAlignment};
use benchdesign_core::{Dataset, MethodRegistry, PostShape};
use thiserror::Error;

/// Fatal problems found before evaluation starts
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// Neither the options nor the registry provide a dataset.
    #[error("no dataset: pass one in the options or bind one to the registry")]
    MissingDataset,

    /// The registry is empty.
    #[error("no methods defined")]
    NoMethods,

    /// Post-processing shapes differ between methods.
    #[error("inconsistent post-processing: '{first}' is {first_shape} but '{label}' is {shape}")]
    MixedPostShapes {
        first: String,
        first_shape: PostShape,
        label: String,
        shape: PostShape,
    },

    /// A multi-channel method declares a different number of channels.
    #[error("inconsistent channel count: '{first}' has {expected} channels but '{label}' has {got}")]
    ChannelCount {
        first: String,
        expected: usize,
        label: String,
        got: usize,
    },

    /// A multi-channel method declares different channel names.
    #[error("inconsistent channel names: '{first}' has [{expected}] but '{label}' has [{got}]")]
    ChannelNames {
        first: String,
        expected: String,
        label: String,
        got: String,
    },

    /// A method names the same channel twice.
    #[error("method '{label}' declares channel '{channel}' more than once")]
    DuplicateChannel { label: String, channel: String },

    /// The id-alignment column is not in the dataset.
    #[error("alignment column '{0}' is not in the dataset")]
    UnknownAlignmentColumn(String),

    /// Ground truth given as a flat list for multi-channel methods.
    #[error("ground truth for multi-channel methods must be keyed by channel name")]
    GroundTruthNotKeyed,

    /// Ground-truth columns do not match the channels one to one.
    #[error("ground truth has {got} column(s) but there are {expected} channel(s)")]
    GroundTruthCount { expected: usize, got: usize },

    /// Ground truth keyed by a channel that does not exist.
    #[error("ground truth names unknown channel '{0}'")]
    UnknownGroundTruthChannel(String),

    /// A ground-truth column is not in the dataset.
    #[error("ground-truth column '{0}' is not in the dataset")]
    UnknownGroundTruthColumn(String),

    /// A feature column is not in the dataset.
    #[error("feature column '{0}' is not in the dataset")]
    UnknownFeatureColumn(String),

    /// A side-table column is not tabular, or its length differs from the others.
    #[error("column '{column}' cannot be tabulated: {reason}")]
    UntabularColumn { column: String, reason: String },
}

/// Result of a successful check: the facts evaluation proceeds from
#[derive(Debug, Clone)]
pub struct Preflight {
    /// Effective dataset (the override, else the registry's)
    pub dataset: Dataset,
    /// Post-processing shape shared by all methods
    pub shape: PostShape,
    /// Output channels, in the first method's order
    pub channels: Vec<String>,
    /// Ground truth as `(channel, column)` pairs in channel order
    pub ground_truth: Option<Vec<(String, String)>>,
}

/// Run every pre-evaluation check in a fixed order.
pub fn check_configuration(
    registry: &MethodRegistry,
    options: &EvaluationOptions,
) -> Result<Preflight, ConfigurationError> {
    let dataset = options
        .dataset
        .clone()
        .or_else(|| registry.dataset().cloned())
        .ok_or(ConfigurationError::MissingDataset)?;

    let methods = registry.methods();
    let first = methods.first().ok_or(ConfigurationError::NoMethods)?;
    let shape = first.post.shape();
    let channels: Vec<String> = first
        .post
        .channel_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut expected_sorted: Vec<&str> = channels.iter().map(String::as_str).collect();
    expected_sorted.sort_unstable();

    for method in methods {
        let method_shape = method.post.shape();
        if method_shape != shape {
            return Err(ConfigurationError::MixedPostShapes {
                first: first.label.clone(),
                first_shape: shape,
                label: method.label.clone(),
                shape: method_shape,
            });
        }
        if shape != PostShape::Multi {
            continue;
        }

        let names = method.post.channel_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        if let Some(dup) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigurationError::DuplicateChannel {
                label: method.label.clone(),
                channel: dup[0].to_string(),
            });
        }
        if names.len() != channels.len() {
            return Err(ConfigurationError::ChannelCount {
                first: first.label.clone(),
                expected: channels.len(),
                label: method.label.clone(),
                got: names.len(),
            });
        }
        if sorted != expected_sorted {
            return Err(ConfigurationError::ChannelNames {
                first: first.label.clone(),
                expected: channels.join(", "),
                label: method.label.clone(),
                got: names.join(", "),
            });
        }
    }

    // side tables take their row ids from the alignment column
    let anchor = match &options.id_alignment {
        IdAlignment::OnColumn(column) => {
            if !dataset.contains(column) {
                return Err(ConfigurationError::UnknownAlignmentColumn(column.clone()));
            }
            Some(column.as_str())
        }
        IdAlignment::Off | IdAlignment::On => None,
    };

    let ground_truth = match &options.ground_truth {
        None => None,
        Some(spec) => Some(check_ground_truth(spec, shape, &channels, &dataset, anchor)?),
    };

    if let Some(features) = &options.feature_columns {
        for column in features {
            if !dataset.contains(column) {
                return Err(ConfigurationError::UnknownFeatureColumn(column.clone()));
            }
        }
        check_tabular(&dataset, features, anchor)?;
    }

    Ok(Preflight {
        dataset,
        shape,
        channels,
        ground_truth,
    })
}

fn check_ground_truth(
    spec: &GroundTruthSpec,
    shape: PostShape,
    channels: &[String],
    dataset: &Dataset,
    anchor: Option<&str>,
) -> Result<Vec<(String, String)>, ConfigurationError> {
    let pairs: Vec<(String, String)> = match spec {
        GroundTruthSpec::Columns(_) if shape == PostShape::Multi => {
            return Err(ConfigurationError::GroundTruthNotKeyed);
        }
        GroundTruthSpec::Columns(columns) => {
            if columns.len() != channels.len() {
                return Err(ConfigurationError::GroundTruthCount {
                    expected: channels.len(),
                    got: columns.len(),
                });
            }
            channels.iter().cloned().zip(columns.iter().cloned()).collect()
        }
        GroundTruthSpec::ByChannel(by_channel) => {
            if by_channel.len() != channels.len() {
                return Err(ConfigurationError::GroundTruthCount {
                    expected: channels.len(),
                    got: by_channel.len(),
                });
            }
            if let Some((unknown, _)) = by_channel.iter().find(|(c, _)| !channels.contains(c)) {
                return Err(ConfigurationError::UnknownGroundTruthChannel(unknown.clone()));
            }
            // same count, all known: reorder to channel order
            let mut ordered = Vec::with_capacity(channels.len());
            for channel in channels {
                match by_channel.iter().find(|(c, _)| c == channel) {
                    Some(pair) => ordered.push(pair.clone()),
                    None => {
                        return Err(ConfigurationError::GroundTruthCount {
                            expected: channels.len(),
                            got: ordered.len(),
                        });
                    }
                }
            }
            ordered
        }
    };

    for (_, column) in &pairs {
        if !dataset.contains(column) {
            return Err(ConfigurationError::UnknownGroundTruthColumn(column.clone()));
        }
    }
    let columns: Vec<String> = pairs.iter().map(|(_, c)| c.clone()).collect();
    check_tabular(dataset, &columns, anchor)?;
    Ok(pairs)
}

/// Side-table columns must have cells and share one length, which is also
/// the length of the alignment column when there is one.
fn check_tabular<'a>(
    dataset: &Dataset,
    columns: &'a [String],
    anchor: Option<&'a str>,
) -> Result<(), ConfigurationError> {
    let mut expected: Option<(&str, usize)> = None;
    for column in anchor.into_iter().chain(columns.iter().map(String::as_str)) {
        let len = dataset
            .column(column)
            .map(|cells| cells.len())
            .ok_or_else(|| ConfigurationError::UntabularColumn {
                column: column.to_string(),
                reason: "field is a function".to_string(),
            })?;
        match expected {
            None => expected = Some((column, len)),
            Some((first, n)) if n != len => {
                return Err(ConfigurationError::UntabularColumn {
                    column: column.to_string(),
                    reason: format!("{len} rows but '{first}' has {n}"),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchdesign_core::{MethodSpec, PostSpec};
    use benchdesign_logic::{DeferredExpr, Value};

    fn dataset() -> Dataset {
        Dataset::from_fields([
            ("p", Value::numbers([0.01, 0.2, 0.05])),
            ("truth", Value::numbers([0.0, 1.0, 0.0])),
            ("gene", Value::texts(["g1", "g2", "g3"])),
        ])
    }

    fn multi(label: &str, channels: &[&str]) -> MethodSpec {
        MethodSpec::new(label, DeferredExpr::symbol("identity")).post(PostSpec::multi(
            channels
                .iter()
                .map(|c| (*c, DeferredExpr::symbol("abs"))),
        ))
    }

    fn registry(methods: Vec<MethodSpec>) -> MethodRegistry {
        methods
            .into_iter()
            .fold(MethodRegistry::new(Some(dataset())), |r, m| {
                r.add_method(m).unwrap()
            })
    }

    #[test]
    fn test_missing_dataset() {
        let r = MethodRegistry::new(None)
            .add_method(MethodSpec::new("m1", DeferredExpr::symbol("identity")))
            .unwrap();
        let err = check_configuration(&r, &EvaluationOptions::default()).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingDataset);
    }

    #[test]
    fn test_override_dataset_is_enough() {
        let r = MethodRegistry::new(None)
            .add_method(MethodSpec::new("m1", DeferredExpr::symbol("identity")))
            .unwrap();
        let options = EvaluationOptions::default().dataset(dataset());
        let pre = check_configuration(&r, &options).unwrap();
        assert_eq!(pre.channels, vec!["default"]);
    }

    #[test]
    fn test_no_methods() {
        let r = MethodRegistry::new(Some(dataset()));
        let err = check_configuration(&r, &EvaluationOptions::default()).unwrap_err();
        assert_eq!(err, ConfigurationError::NoMethods);
    }

    #[test]
    fn test_mixed_shapes() {
        let r = registry(vec![
            MethodSpec::new("a", DeferredExpr::symbol("identity")),
            MethodSpec::new("b", DeferredExpr::symbol("identity"))
                .post(PostSpec::Single(DeferredExpr::symbol("abs"))),
        ]);
        let err = check_configuration(&r, &EvaluationOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::MixedPostShapes { .. }));
        assert!(err.to_string().contains("'a' is none but 'b' is single"));
    }

    #[test]
    fn test_channel_mismatch() {
        let r = registry(vec![multi("a", &["x", "y"]), multi("b", &["x"])]);
        let err = check_configuration(&r, &EvaluationOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::ChannelCount { expected: 2, got: 1, .. }));

        let r = registry(vec![multi("a", &["x", "y"]), multi("b", &["x", "z"])]);
        let err = check_configuration(&r, &EvaluationOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::ChannelNames { .. }));
    }

    #[test]
    fn test_channel_order_may_differ() {
        let r = registry(vec![multi("a", &["x", "y"]), multi("b", &["y", "x"])]);
        let pre = check_configuration(&r, &EvaluationOptions::default()).unwrap();
        assert_eq!(pre.channels, vec!["x", "y"]);
    }

    #[test]
    fn test_duplicate_channel() {
        let r = registry(vec![multi("a", &["x", "x"])]);
        let err = check_configuration(&r, &EvaluationOptions::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateChannel { .. }));
    }

    #[test]
    fn test_alignment_column() {
        let r = registry(vec![MethodSpec::new("a", DeferredExpr::symbol("identity"))]);
        let options = EvaluationOptions::default().id_alignment(IdAlignment::OnColumn("nope".into()));
        assert_eq!(
            check_configuration(&r, &options).unwrap_err(),
            ConfigurationError::UnknownAlignmentColumn("nope".to_string())
        );
    }

    #[test]
    fn test_ground_truth_rules() {
        let single = registry(vec![MethodSpec::new("a", DeferredExpr::symbol("identity"))]);
        let ok = EvaluationOptions::default().ground_truth(GroundTruthSpec::Columns(vec!["truth".into()]));
        let pre = check_configuration(&single, &ok).unwrap();
        assert_eq!(
            pre.ground_truth,
            Some(vec![("default".to_string(), "truth".to_string())])
        );

        let two = EvaluationOptions::default()
            .ground_truth(GroundTruthSpec::Columns(vec!["truth".into(), "p".into()]));
        assert!(matches!(
            check_configuration(&single, &two).unwrap_err(),
            ConfigurationError::GroundTruthCount { expected: 1, got: 2 }
        ));

        let missing = EvaluationOptions::default()
            .ground_truth(GroundTruthSpec::Columns(vec!["nope".into()]));
        assert_eq!(
            check_configuration(&single, &missing).unwrap_err(),
            ConfigurationError::UnknownGroundTruthColumn("nope".to_string())
        );

        let multi_reg = registry(vec![multi("a", &["x", "y"])]);
        let flat = EvaluationOptions::default()
            .ground_truth(GroundTruthSpec::Columns(vec!["truth".into(), "p".into()]));
        assert_eq!(
            check_configuration(&multi_reg, &flat).unwrap_err(),
            ConfigurationError::GroundTruthNotKeyed
        );

        let keyed = EvaluationOptions::default().ground_truth(GroundTruthSpec::ByChannel(vec![
            ("y".into(), "p".into()),
            ("x".into(), "truth".into()),
        ]));
        let pre = check_configuration(&multi_reg, &keyed).unwrap();
        assert_eq!(
            pre.ground_truth.unwrap(),
            vec![
                ("x".to_string(), "truth".to_string()),
                ("y".to_string(), "p".to_string())
            ]
        );
    }

    #[test]
    fn test_feature_columns() {
        let r = registry(vec![MethodSpec::new("a", DeferredExpr::symbol("identity"))]);
        let bad = EvaluationOptions::default().feature_columns(["gene", "nope"]);
        assert_eq!(
            check_configuration(&r, &bad).unwrap_err(),
            ConfigurationError::UnknownFeatureColumn("nope".to_string())
        );
        let good = EvaluationOptions::default().feature_columns(["gene", "p"]);
        assert!(check_configuration(&r, &good).is_ok());
    }

    #[test]
    fn test_side_tables_match_alignment_column() {
        let ds = Dataset::from_fields([
            ("gene", Value::texts(["g1", "g2", "g3"])),
            ("truth", Value::numbers([0.0, 1.0])),
        ]);
        let r = MethodRegistry::new(Some(ds))
            .add_method(MethodSpec::new("a", DeferredExpr::symbol("identity")))
            .unwrap();
        let by_gene = EvaluationOptions::default().id_alignment(IdAlignment::OnColumn("gene".into()));

        let truth = by_gene
            .clone()
            .ground_truth(GroundTruthSpec::Columns(vec!["truth".into()]));
        let err = check_configuration(&r, &truth).unwrap_err();
        assert!(matches!(
            &err,
            ConfigurationError::UntabularColumn { column, .. } if column == "truth"
        ));
        assert!(err.to_string().contains("2 rows but 'gene' has 3"));

        let features = by_gene.clone().feature_columns(["truth"]);
        assert!(matches!(
            check_configuration(&r, &features).unwrap_err(),
            ConfigurationError::UntabularColumn { .. }
        ));

        // positional side tables carry no ids, so only their own lengths matter
        let positional = EvaluationOptions::default()
            .ground_truth(GroundTruthSpec::Columns(vec!["truth".into()]));
        assert!(check_configuration(&r, &positional).is_ok());
        assert!(check_configuration(&r, &by_gene).is_ok());
    }
}
