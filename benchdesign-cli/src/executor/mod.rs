//! Evaluation Executor
//!
//! Checks a registry, runs its methods and assembles the results.
//!
//! ## Pipeline Overview
//!
//! ```text
//! MethodRegistry (+ dataset override)
//!       │
//!       ▼
//! ┌─────────────┐
//! │ consistency │  Preflight checks, fatal on any mismatch
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  execution  │  One contained task per method (sequential or pool)
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  assembly   │  Per-channel tables (parallel), side tables
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  metadata   │  One row per method, provenance
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  ResultBundle
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`consistency`] - Configuration checks run before any method
//! - [`execution`] - Per-method tasks, failure containment, worker pool
//! - [`assembly`] - Alignment policies and side tables
//! - [`metadata`] - Metadata table and provenance resolution
//! - [`report`] - Bundle building
//! - [`formatting`] - Human-readable output formatting

mod assembly;
mod consistency;
mod execution;
mod formatting;
mod metadata;
mod report;

// Re-export public API
pub use assembly::{
    AssemblyInconsistency, assemble_channels, build_ground_truth, build_side_table, column_ids,
};
pub use consistency::{ConfigurationError, Preflight, check_configuration};
pub use execution::{
    EvaluationFailure, ExecutionConfig, FailureStage, MethodOutcome, MethodOutput,
    ParallelExecutor, default_workers, evaluate_method, run_task,
};
pub use formatting::format_human_output;
pub use metadata::{ProvenanceSource, build_metadata, render_func, resolve_provenance};
pub use report::{BundleParts, build_bundle};
