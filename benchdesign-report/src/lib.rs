#![warn(missing_docs)]
//! BenchDesign Report - Result Bundles
//!
//! Data structures produced by one evaluation, and their output formats:
//! - JSON (machine-readable, round-trips)
//! - CSV (one block per channel)
//! - Human-readable text is produced by the CLI crate

mod csv;
mod json;
mod report;

pub use csv::{generate_csv_report, table_to_csv};
pub use json::{SCHEMA_VERSION, generate_json_report, parse_json_report};
pub use report::{
    AssayTable, BundleMeta, FailureInfo, GroundTruth, MetadataTable, MetricSlot, ResultBundle,
    RunConfig, Table,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON with full schema
    Json,
    /// CSV for spreadsheets
    Csv,
    /// Human-readable terminal output
    Human,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
