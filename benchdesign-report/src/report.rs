//! Result Bundle Data Structures

use benchdesign_logic::Scalar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column-major table of cells with optional row identifiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Row identifiers; `None` for positional tables
    pub row_ids: Option<Vec<String>>,
    /// Column names
    pub columns: Vec<String>,
    /// `cells[col][row]`
    pub cells: Vec<Vec<Scalar>>,
}

impl Table {
    /// Table from columns of equal length
    pub fn new(columns: Vec<String>, cells: Vec<Vec<Scalar>>, row_ids: Option<Vec<String>>) -> Self {
        debug_assert_eq!(columns.len(), cells.len());
        Self {
            row_ids,
            columns,
            cells,
        }
    }

    /// Number of rows
    pub fn n_rows(&self) -> usize {
        match (&self.row_ids, self.cells.first()) {
            (Some(ids), _) => ids.len(),
            (None, Some(col)) => col.len(),
            (None, None) => 0,
        }
    }

    /// Number of columns
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Cells of a named column
    pub fn column(&self, name: &str) -> Option<&[Scalar]> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.cells.get(idx).map(Vec::as_slice)
    }

    /// First row index carrying `id`
    pub fn row_index(&self, id: &str) -> Option<usize> {
        self.row_ids.as_ref()?.iter().position(|r| r == id)
    }

    /// Cell at (`row_id`, `column`)
    pub fn cell(&self, row_id: &str, column: &str) -> Option<&Scalar> {
        let row = self.row_index(row_id)?;
        self.column(column)?.get(row)
    }

    /// One row across all columns
    pub fn row(&self, index: usize) -> Option<Vec<&Scalar>> {
        self.cells.iter().map(|col| col.get(index)).collect()
    }
}

/// Per-channel results: rows are features, columns are method labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayTable {
    /// Output channel
    pub channel: String,
    /// Cells
    #[serde(flatten)]
    pub table: Table,
}

impl AssayTable {
    /// Cells of one method
    pub fn method(&self, label: &str) -> Option<&[Scalar]> {
        self.table.column(label)
    }
}

/// One row per method, describing how it was defined
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataTable {
    /// Column names; the first is always `label`
    pub columns: Vec<String>,
    /// `rows[method]`, aligned with `columns`
    pub rows: Vec<Vec<Scalar>>,
}

impl MetadataTable {
    /// Value of `column` for method `label`
    pub fn get(&self, label: &str, column: &str) -> Option<&Scalar> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|row| matches!(row.first(), Some(Scalar::Text(l)) if l == label))
            .and_then(|row| row.get(col))
    }

    /// Method labels in row order
    pub fn labels(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first().map(Scalar::to_string))
            .collect()
    }
}

/// Ground-truth values taken from dataset columns, one column per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// `(channel, source column)` pairs
    pub sources: Vec<(String, String)>,
    /// Cells; column names are channel names
    pub table: Table,
}

/// Per-channel container for metrics computed after evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSlot {
    /// Metric name → table of results
    pub metrics: BTreeMap<String, Table>,
}

impl MetricSlot {
    /// Whether no metrics have been added
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// A method whose evaluation failed and was replaced by missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Method label
    pub method: String,
    /// Failure stage: `resolve`, `call`, `post` or `panic`
    pub kind: String,
    /// Underlying cause
    pub message: String,
}

/// Execution settings recorded in the bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub concurrent: bool,
    pub workers: usize,
    pub alignment: String,
    pub tabular_parameters: bool,
}

/// Bundle metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
    pub channels: Vec<String>,
    pub methods: Vec<String>,
    pub failures: Vec<FailureInfo>,
    pub config: RunConfig,
}

/// Everything one evaluation produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub meta: BundleMeta,
    /// One table per channel, in channel order
    pub assays: Vec<AssayTable>,
    pub metadata: MetadataTable,
    /// Channel → metric slot, created empty
    pub metrics: BTreeMap<String, MetricSlot>,
    pub ground_truth: Option<GroundTruth>,
    pub features: Option<Table>,
}

impl ResultBundle {
    /// Assay table of `channel`
    pub fn assay(&self, channel: &str) -> Option<&AssayTable> {
        self.assays.iter().find(|a| a.channel == channel)
    }

    /// Channel names in order
    pub fn channels(&self) -> Vec<&str> {
        self.assays.iter().map(|a| a.channel.as_str()).collect()
    }

    /// Whether method `label` failed during evaluation
    pub fn failed(&self, label: &str) -> bool {
        self.meta.failures.iter().any(|f| f.method == label)
    }
}
