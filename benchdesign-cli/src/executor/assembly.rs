//! Result Assembly
//!
//! Turns per-method outcomes into one [`AssayTable`] per channel. Channels
//! are assembled in parallel with rayon.
//!
//! | alignment       | requirement                   | rows                               |
//! |-----------------|-------------------------------|------------------------------------|
//! | `off`           | outputs share one length      | output order                       |
//! | `on`            | outputs are id-keyed          | union of ids, first appearance     |
//! | `column:NAME`   | outputs are id-keyed          | exactly the values of column NAME  |
//!
//! A failed method contributes a column of missing values.

use super::execution::MethodOutcome;
use crate::evaluate::IdAlignment;
use benchdesign_core::{Dataset, MethodSpec};
use benchdesign_logic::{Scalar, Value};
use benchdesign_report::{AssayTable, GroundTruth, Table};
use fxhash::FxHashMap;
use rayon::prelude::*;
use thiserror::Error;

/// Fatal problems found while building tables
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum AssemblyInconsistency {
    /// With alignment off, outputs of one channel differ in length.
    #[error(
        "output length mismatch in channel '{channel}': '{first}' returned {expected} values but '{label}' returned {got}"
    )]
    LengthMismatch {
        channel: String,
        first: String,
        expected: usize,
        label: String,
        got: usize,
    },

    /// With alignment on, an output is not an id-keyed mapping.
    #[error("id alignment needs id-keyed output, but '{label}' returned a {kind} in channel '{channel}'")]
    NotKeyed {
        channel: String,
        label: String,
        kind: &'static str,
    },

    /// An output has no cell form.
    #[error("'{label}' returned a {kind} in channel '{channel}', which cannot be tabulated")]
    NotTabular {
        channel: String,
        label: String,
        kind: &'static str,
    },

    /// A successful method has no output for a channel.
    #[error("'{label}' produced no output for channel '{channel}'")]
    MissingChannel { channel: String, label: String },
}

/// Build one table per channel. Under id alignment every channel gets the
/// same row ids.
pub fn assemble_channels(
    channels: &[String],
    methods: &[MethodSpec],
    outcomes: &[MethodOutcome],
    alignment: &IdAlignment,
    dataset: &Dataset,
) -> Result<Vec<AssayTable>, AssemblyInconsistency> {
    let outputs = channels
        .iter()
        .map(|channel| channel_outputs(channel, methods, outcomes))
        .collect::<Result<Vec<_>, _>>()?;

    let tables: Vec<Table> = match alignment {
        IdAlignment::Off => channels
            .par_iter()
            .zip(&outputs)
            .map(|(channel, outputs)| by_position(channel, outputs))
            .collect::<Result<_, _>>()?,
        IdAlignment::On | IdAlignment::OnColumn(_) => {
            let keyed = channels
                .par_iter()
                .zip(&outputs)
                .map(|(channel, outputs)| keyed_outputs(channel, outputs))
                .collect::<Result<Vec<_>, _>>()?;
            let ids = match alignment {
                IdAlignment::OnColumn(column) => column_ids(dataset, column),
                IdAlignment::Off | IdAlignment::On => union_ids(keyed.iter().flatten()),
            };
            outputs
                .par_iter()
                .zip(&keyed)
                .map(|(outputs, keyed)| by_ids(outputs, keyed, ids.clone()))
                .collect()
        }
    };

    Ok(channels
        .iter()
        .zip(tables)
        .map(|(channel, table)| {
            tracing::debug!(
                channel = channel.as_str(),
                rows = table.n_rows(),
                columns = table.n_cols(),
                "assembled channel"
            );
            AssayTable {
                channel: channel.clone(),
                table,
            }
        })
        .collect())
}

/// Each method's output for `channel`; `None` for a failed method.
fn channel_outputs<'a>(
    channel: &str,
    methods: &'a [MethodSpec],
    outcomes: &'a [MethodOutcome],
) -> Result<Vec<(&'a str, Option<&'a Value>)>, AssemblyInconsistency> {
    methods
        .iter()
        .zip(outcomes)
        .map(|(method, outcome)| {
            let value = match outcome {
                Ok(output) => Some(output.channel(channel).ok_or_else(|| {
                    AssemblyInconsistency::MissingChannel {
                        channel: channel.to_string(),
                        label: method.label.clone(),
                    }
                })?),
                Err(_) => None,
            };
            Ok((method.label.as_str(), value))
        })
        .collect()
}

fn by_position(
    channel: &str,
    outputs: &[(&str, Option<&Value>)],
) -> Result<Table, AssemblyInconsistency> {
    let mut columns = Vec::with_capacity(outputs.len());
    let mut expected: Option<(&str, usize)> = None;

    for (label, value) in outputs {
        let cells = match value {
            Some(value) => {
                let cells = (*value).clone().into_cells().ok_or_else(|| {
                    AssemblyInconsistency::NotTabular {
                        channel: channel.to_string(),
                        label: label.to_string(),
                        kind: value.kind(),
                    }
                })?;
                match expected {
                    None => expected = Some((*label, cells.len())),
                    Some((first, n)) if n != cells.len() => {
                        return Err(AssemblyInconsistency::LengthMismatch {
                            channel: channel.to_string(),
                            first: first.to_string(),
                            expected: n,
                            label: label.to_string(),
                            got: cells.len(),
                        });
                    }
                    Some(_) => {}
                }
                Some(cells)
            }
            None => None,
        };
        columns.push(cells);
    }

    // every method failed: one placeholder row
    let n_rows = expected.map(|(_, n)| n).unwrap_or(1);
    let cells = columns
        .into_iter()
        .map(|c| c.unwrap_or_else(|| vec![Scalar::Missing; n_rows]))
        .collect();
    Ok(Table::new(labels(outputs), cells, None))
}

type KeyedCells = FxHashMap<String, Scalar>;
type KeyedOutput = Option<(Vec<String>, KeyedCells)>;

/// Id → cell per successful output; a repeated id keeps its last value.
fn keyed_outputs(
    channel: &str,
    outputs: &[(&str, Option<&Value>)],
) -> Result<Vec<KeyedOutput>, AssemblyInconsistency> {
    outputs
        .iter()
        .map(|(label, value)| {
            let Some(value) = value else {
                return Ok(None);
            };
            let entries = (*value).clone().into_keyed().ok_or_else(|| {
                AssemblyInconsistency::NotKeyed {
                    channel: channel.to_string(),
                    label: label.to_string(),
                    kind: value.kind(),
                }
            })?;
            let mut order = Vec::with_capacity(entries.len());
            let mut cells = KeyedCells::default();
            for (id, cell) in entries {
                if cells.insert(id.clone(), cell).is_none() {
                    order.push(id);
                }
            }
            Ok(Some((order, cells)))
        })
        .collect()
}

/// Ids in first-appearance order, channel by channel then method by method.
fn union_ids<'a>(keyed: impl IntoIterator<Item = &'a KeyedOutput>) -> Vec<String> {
    let mut seen = fxhash::FxHashSet::default();
    let mut ids = Vec::new();
    for (order, _) in keyed.into_iter().flatten() {
        for id in order {
            if seen.insert(id.as_str()) {
                ids.push(id.clone());
            }
        }
    }
    ids
}

fn by_ids(
    outputs: &[(&str, Option<&Value>)],
    keyed: &[KeyedOutput],
    ids: Vec<String>,
) -> Table {
    let cells = keyed
        .iter()
        .map(|entry| match entry {
            Some((_, cells)) => ids
                .iter()
                .map(|id| cells.get(id).cloned().unwrap_or_default())
                .collect(),
            None => vec![Scalar::Missing; ids.len()],
        })
        .collect();
    Table::new(labels(outputs), cells, Some(ids))
}

/// Row ids from a dataset column; missing cells become `NA`.
pub fn column_ids(dataset: &Dataset, column: &str) -> Vec<String> {
    dataset
        .column(column)
        .unwrap_or_default()
        .iter()
        .map(|cell| cell.to_id().unwrap_or_else(|| Scalar::Missing.to_string()))
        .collect()
}

fn labels(outputs: &[(&str, Option<&Value>)]) -> Vec<String> {
    outputs.iter().map(|(l, _)| l.to_string()).collect()
}

/// Positional table of dataset columns. Rows carry the alignment column's
/// values as ids only under `column:NAME` alignment.
pub fn build_side_table(dataset: &Dataset, columns: &[String], alignment: &IdAlignment) -> Table {
    let cells = columns
        .iter()
        .map(|c| dataset.column(c).unwrap_or_default())
        .collect();
    Table::new(columns.to_vec(), cells, side_row_ids(dataset, alignment))
}

/// Ground-truth table: one column per channel, named after the channel.
pub fn build_ground_truth(
    dataset: &Dataset,
    sources: &[(String, String)],
    alignment: &IdAlignment,
) -> GroundTruth {
    let columns = sources.iter().map(|(channel, _)| channel.clone()).collect();
    let cells = sources
        .iter()
        .map(|(_, column)| dataset.column(column).unwrap_or_default())
        .collect();
    GroundTruth {
        sources: sources.to_vec(),
        table: Table::new(columns, cells, side_row_ids(dataset, alignment)),
    }
}

fn side_row_ids(dataset: &Dataset, alignment: &IdAlignment) -> Option<Vec<String>> {
    match alignment {
        IdAlignment::OnColumn(column) => Some(column_ids(dataset, column)),
        IdAlignment::Off | IdAlignment::On => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::execution::{EvaluationFailure, FailureStage, MethodOutput};
    use benchdesign_logic::DeferredExpr;

    fn methods(labels: &[&str]) -> Vec<MethodSpec> {
        labels
            .iter()
            .map(|l| MethodSpec::new(*l, DeferredExpr::symbol("identity")))
            .collect()
    }

    fn ok(v: Value) -> MethodOutcome {
        Ok(MethodOutput::Single(v))
    }

    fn failed(label: &str) -> MethodOutcome {
        Err(EvaluationFailure {
            label: label.to_string(),
            stage: FailureStage::Call,
            message: "boom".to_string(),
        })
    }

    fn channels() -> Vec<String> {
        vec!["default".to_string()]
    }

    #[test]
    fn test_positional_columns_in_order() {
        let out = assemble_channels(
            &channels(),
            &methods(&["m1", "m2"]),
            &[
                ok(Value::numbers([1.0, 2.0, 3.0])),
                ok(Value::numbers([4.0, 5.0, 6.0])),
            ],
            &IdAlignment::Off,
            &Dataset::new(),
        )
        .unwrap();
        let t = &out[0].table;
        assert_eq!(t.columns, vec!["m1", "m2"]);
        assert_eq!(t.n_rows(), 3);
        assert!(t.row_ids.is_none());
    }

    #[test]
    fn test_length_mismatch() {
        let err = assemble_channels(
            &channels(),
            &methods(&["m1", "m2"]),
            &[ok(Value::numbers([1.0, 2.0])), ok(Value::numbers([1.0]))],
            &IdAlignment::Off,
            &Dataset::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AssemblyInconsistency::LengthMismatch { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn test_failed_method_is_missing_column() {
        let out = assemble_channels(
            &channels(),
            &methods(&["m1", "bad", "m3"]),
            &[
                ok(Value::numbers([1.0, 2.0])),
                failed("bad"),
                ok(Value::numbers([3.0, 4.0])),
            ],
            &IdAlignment::Off,
            &Dataset::new(),
        )
        .unwrap();
        let t = &out[0].table;
        assert_eq!(t.column("bad").unwrap(), &[Scalar::Missing, Scalar::Missing]);
        assert_eq!(
            t.column("m3").unwrap(),
            &[Scalar::Number(3.0), Scalar::Number(4.0)]
        );
    }

    #[test]
    fn test_all_failed_positional_has_one_row() {
        let out = assemble_channels(
            &channels(),
            &methods(&["a"]),
            &[failed("a")],
            &IdAlignment::Off,
            &Dataset::new(),
        )
        .unwrap();
        assert_eq!(out[0].table.n_rows(), 1);
    }

    #[test]
    fn test_id_union() {
        let out = assemble_channels(
            &channels(),
            &methods(&["a", "b"]),
            &[
                ok(Value::keyed([("g1", 1.0), ("g2", 2.0)])),
                ok(Value::keyed([("g2", 3.0), ("g3", 4.0)])),
            ],
            &IdAlignment::On,
            &Dataset::new(),
        )
        .unwrap();
        let t = &out[0].table;
        assert_eq!(
            t.row_ids.as_deref().unwrap(),
            &["g1".to_string(), "g2".to_string(), "g3".to_string()]
        );
        assert_eq!(t.cell("g3", "a"), Some(&Scalar::Missing));
        assert_eq!(t.cell("g1", "b"), Some(&Scalar::Missing));
        assert_eq!(t.cell("g2", "b"), Some(&Scalar::Number(3.0)));
    }

    #[test]
    fn test_duplicate_id_last_wins() {
        let out = assemble_channels(
            &channels(),
            &methods(&["a"]),
            &[ok(Value::keyed([("g1", 1.0), ("g1", 5.0)]))],
            &IdAlignment::On,
            &Dataset::new(),
        )
        .unwrap();
        assert_eq!(out[0].table.n_rows(), 1);
        assert_eq!(out[0].table.cell("g1", "a"), Some(&Scalar::Number(5.0)));
    }

    #[test]
    fn test_unkeyed_output_with_alignment() {
        let err = assemble_channels(
            &channels(),
            &methods(&["a"]),
            &[ok(Value::numbers([1.0]))],
            &IdAlignment::On,
            &Dataset::new(),
        )
        .unwrap_err();
        assert!(matches!(err, AssemblyInconsistency::NotKeyed { kind: "vector", .. }));
    }

    #[test]
    fn test_reindex_by_column() {
        let ds = Dataset::from_fields([("gene", Value::texts(["g3", "g0", "g3", "g1"]))]);
        let out = assemble_channels(
            &channels(),
            &methods(&["a"]),
            &[ok(Value::keyed([("g1", 1.0), ("g2", 2.0), ("g3", 3.0)]))],
            &IdAlignment::OnColumn("gene".to_string()),
            &ds,
        )
        .unwrap();
        let t = &out[0].table;
        assert_eq!(
            t.row_ids.as_deref().unwrap(),
            &["g3".to_string(), "g0".to_string(), "g3".to_string(), "g1".to_string()]
        );
        assert_eq!(
            t.column("a").unwrap(),
            &[
                Scalar::Number(3.0),
                Scalar::Missing,
                Scalar::Number(3.0),
                Scalar::Number(1.0)
            ]
        );
    }

    #[test]
    fn test_multi_channel_tables() {
        let outcome = Ok(MethodOutput::Channels(vec![
            ("x".to_string(), Value::numbers([1.0])),
            ("y".to_string(), Value::numbers([2.0])),
        ]));
        let chans = vec!["x".to_string(), "y".to_string()];
        let out = assemble_channels(
            &chans,
            &methods(&["a"]),
            &[outcome],
            &IdAlignment::Off,
            &Dataset::new(),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].channel, "y");
        assert_eq!(out[1].method("a").unwrap(), &[Scalar::Number(2.0)]);
    }

    #[test]
    fn test_multi_channel_id_union_is_shared() {
        let outcome = Ok(MethodOutput::Channels(vec![
            (
                "x".to_string(),
                Value::keyed([("g1", 1.0), ("g2", 2.0), ("g9", 9.0)]),
            ),
            ("y".to_string(), Value::keyed([("g1", 1.0), ("g2", 2.0)])),
        ]));
        let other = Ok(MethodOutput::Channels(vec![
            ("x".to_string(), Value::keyed([("g2", 0.5)])),
            ("y".to_string(), Value::keyed([("g4", 0.4)])),
        ]));
        let chans = vec!["x".to_string(), "y".to_string()];
        let out = assemble_channels(
            &chans,
            &methods(&["a", "b"]),
            &[outcome, other],
            &IdAlignment::On,
            &Dataset::new(),
        )
        .unwrap();

        let expected: Vec<String> = ["g1", "g2", "g9", "g4"].map(String::from).to_vec();
        assert_eq!(out[0].table.row_ids.as_ref(), Some(&expected));
        assert_eq!(out[1].table.row_ids.as_ref(), Some(&expected));
        assert_eq!(out[1].table.cell("g9", "a"), Some(&Scalar::Missing));
        assert_eq!(out[0].table.cell("g4", "b"), Some(&Scalar::Missing));
        assert_eq!(out[1].table.cell("g4", "b"), Some(&Scalar::Number(0.4)));
    }

    #[test]
    fn test_side_tables() {
        let ds = Dataset::from_fields([
            ("gene", Value::texts(["g1", "g2"])),
            ("truth", Value::numbers([0.0, 1.0])),
        ]);
        let gt = build_ground_truth(
            &ds,
            &[("default".to_string(), "truth".to_string())],
            &IdAlignment::OnColumn("gene".to_string()),
        );
        assert_eq!(gt.table.columns, vec!["default"]);
        assert_eq!(gt.table.cell("g2", "default"), Some(&Scalar::Number(1.0)));

        let features = build_side_table(&ds, &["gene".to_string()], &IdAlignment::Off);
        assert!(features.row_ids.is_none());
        assert_eq!(features.n_rows(), 2);
    }
}
