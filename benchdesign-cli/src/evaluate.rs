//! Evaluation
//!
//! Runs every method of a registry against a dataset and assembles the
//! outputs into a [`ResultBundle`].
//!
//! ```text
//! MethodRegistry + EvaluationOptions
//!        │
//!        ▼
//!   check_configuration   fatal ConfigurationError, nothing has run yet
//!        │
//!        ▼
//!   ParallelExecutor      per-method failures are contained
//!        │
//!        ▼
//!   assemble_channels     fatal AssemblyInconsistency
//!        │
//!        ▼
//!   metadata + side tables + bundle
//! ```

use crate::executor::{
    AssemblyInconsistency, BundleParts, ConfigurationError, ExecutionConfig, ParallelExecutor,
    assemble_channels, build_bundle, build_ground_truth, build_metadata, build_side_table,
    default_workers,
};
use benchdesign_core::{Dataset, MethodRegistry};
use benchdesign_report::{ResultBundle, RunConfig};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// How method outputs are lined up into rows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdAlignment {
    /// By position; all outputs of a channel share one length
    #[default]
    Off,
    /// By id; rows are the union of ids in first-appearance order
    On,
    /// By id, reindexed to the values of a dataset column
    OnColumn(String),
}

impl FromStr for IdAlignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "off" => Ok(IdAlignment::Off),
            "on" => Ok(IdAlignment::On),
            other => match other.strip_prefix("column:") {
                Some(name) if !name.trim().is_empty() => {
                    Ok(IdAlignment::OnColumn(name.trim().to_string()))
                }
                _ => Err(format!(
                    "Unknown alignment: {other} (expected off, on or column:NAME)"
                )),
            },
        }
    }
}

impl fmt::Display for IdAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdAlignment::Off => write!(f, "off"),
            IdAlignment::On => write!(f, "on"),
            IdAlignment::OnColumn(name) => write!(f, "column:{name}"),
        }
    }
}

/// Which dataset columns hold the ground truth
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroundTruthSpec {
    /// One column per channel, in channel order
    Columns(Vec<String>),
    /// `(channel, column)` pairs; required for multi-channel methods
    ByChannel(Vec<(String, String)>),
}

/// Options for [`evaluate`]
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    /// Overrides the registry's dataset
    pub dataset: Option<Dataset>,
    /// Dataset columns holding the ground truth
    pub ground_truth: Option<GroundTruthSpec>,
    /// Dataset columns carried into the bundle as features
    pub feature_columns: Option<Vec<String>>,
    /// One metadata column per parameter instead of a combined one
    pub tabular_parameters: bool,
    /// Row alignment policy
    pub id_alignment: IdAlignment,
    /// Run methods on a worker pool
    pub concurrent: bool,
    /// Worker count in concurrent mode; defaults to the number of cores
    pub pool_size: Option<usize>,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl EvaluationOptions {
    /// Evaluate against `dataset` instead of the registry's
    pub fn dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Compare against ground-truth columns
    pub fn ground_truth(mut self, spec: GroundTruthSpec) -> Self {
        self.ground_truth = Some(spec);
        self
    }

    /// Carry these dataset columns into the bundle
    pub fn feature_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.feature_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// One metadata column per parameter
    pub fn tabular_parameters(mut self, tabular: bool) -> Self {
        self.tabular_parameters = tabular;
        self
    }

    /// Row alignment policy
    pub fn id_alignment(mut self, alignment: IdAlignment) -> Self {
        self.id_alignment = alignment;
        self
    }

    /// Run methods on a worker pool
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Worker count in concurrent mode
    pub fn pool_size(mut self, workers: usize) -> Self {
        self.pool_size = Some(workers);
        self
    }

    /// Draw a progress bar
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Fatal evaluation errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvaluationError {
    /// A check before any method ran
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Outputs could not be assembled into tables
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyInconsistency),

    /// The worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// Evaluate every method in `registry`.
pub fn evaluate(
    registry: &MethodRegistry,
    options: &EvaluationOptions,
) -> Result<ResultBundle, EvaluationError> {
    let start = Instant::now();
    let preflight = crate::executor::check_configuration(registry, options)?;
    let methods = registry.methods();

    let executor = ParallelExecutor::new(ExecutionConfig {
        concurrent: options.concurrent,
        workers: options.pool_size.unwrap_or_else(default_workers),
        show_progress: options.show_progress,
    });
    let workers = executor.effective_workers(methods.len());
    tracing::info!(
        methods = methods.len(),
        channels = preflight.channels.len(),
        workers,
        alignment = %options.id_alignment,
        "evaluating methods"
    );

    let outcomes = executor
        .execute(methods, &preflight.dataset)
        .map_err(|e| EvaluationError::Pool(e.to_string()))?;

    let assays = assemble_channels(
        &preflight.channels,
        methods,
        &outcomes,
        &options.id_alignment,
        &preflight.dataset,
    )?;

    let metadata = build_metadata(methods, options.tabular_parameters);
    let ground_truth = preflight
        .ground_truth
        .as_ref()
        .map(|sources| build_ground_truth(&preflight.dataset, sources, &options.id_alignment));
    let features = options
        .feature_columns
        .as_ref()
        .map(|columns| build_side_table(&preflight.dataset, columns, &options.id_alignment));

    let failures: Vec<_> = outcomes.into_iter().filter_map(Result::err).collect();
    if !failures.is_empty() {
        tracing::warn!(
            failed = failures.len(),
            methods = methods.len(),
            "some methods failed; their columns are missing"
        );
    }

    Ok(build_bundle(BundleParts {
        assays,
        metadata,
        ground_truth,
        features,
        failures,
        config: RunConfig {
            concurrent: options.concurrent,
            workers,
            alignment: options.id_alignment.to_string(),
            tabular_parameters: options.tabular_parameters,
        },
        duration_ms: start.elapsed().as_secs_f64() * 1000.0,
    }))
}
