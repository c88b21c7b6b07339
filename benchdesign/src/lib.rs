#![warn(missing_docs)]
//! # BenchDesign
//!
//! Declare competing methods against a dataset that may not exist yet, then
//! evaluate them all and get back aligned, comparable tables.
//!
//! - **Deferred parameters**: method parameters are expressions resolved
//!   against the dataset first and the definition-time scope second
//! - **Immutable registry**: `add`, `modify`, `expand` and `drop` each return
//!   a new registry
//! - **Failure containment**: a method that errors or panics becomes a
//!   missing column; its siblings are unaffected
//! - **Parallel evaluation**: methods run on a dedicated rayon pool, results
//!   come back in registry order
//! - **Alignment**: outputs are lined up by position, by id, or by a dataset
//!   column
//! - **Provenance**: every method's callable, parameters and defining library
//!   are recorded in a metadata table
//!
//! ## Quick Start
//!
//! ```ignore
//! use benchdesign::prelude::*;
//!
//! let scope = builtins::scope();
//! let data = Dataset::from_fields([("p", Value::numbers([0.01, 0.2, 0.05]))]);
//!
//! let registry = MethodRegistry::new(Some(data))
//!     .add_method(
//!         MethodSpec::new("raw", DeferredExpr::symbol("identity").capture(&scope))
//!             .param("x", DeferredExpr::symbol("p")),
//!     )?
//!     .add_method(
//!         MethodSpec::new("bonf", DeferredExpr::symbol("bonferroni").capture(&scope))
//!             .param("x", DeferredExpr::symbol("p")),
//!     )?;
//!
//! let bundle = evaluate(&registry, &EvaluationOptions::default().concurrent(true))?;
//! println!("{}", format_human_output(&bundle));
//! ```
//!
//! ## Variants
//!
//! ```ignore
//! let registry = registry.expand_method(
//!     "bonf",
//!     Variants::param("x", [
//!         ("bonf_half", DeferredExpr::formula("p / 2")),
//!         ("bonf_double", DeferredExpr::formula("p * 2")),
//!     ]),
//!     true,
//! )?;
//! ```

// Re-export core types
pub use benchdesign_core::{
    DEFAULT_CHANNEL, Dataset, DatasetError, DefinitionError, MethodMeta, MethodRegistry,
    MethodSpec, MethodUpdate, PostShape, PostSpec, ProvenanceOverride, RESERVED_KEYS, Variants,
};

// Re-export logic types
pub use benchdesign_logic::{
    Args, CallError, CallResult, Callable, DeferredExpr, Lookup, Provenance, ResolveError,
    Scalar, Scope, Value, builtins,
};

// Re-export report types
pub use benchdesign_report::{
    AssayTable, BundleMeta, FailureInfo, GroundTruth, MetadataTable, MetricSlot, OutputFormat,
    ResultBundle, RunConfig, Table, generate_csv_report, generate_json_report, parse_json_report,
};

// Re-export the evaluation engine
pub use benchdesign_cli::{
    AssemblyInconsistency, BenchConfig, ConfigurationError, EvaluationError, EvaluationFailure,
    EvaluationOptions, FailureStage, GroundTruthSpec, IdAlignment, ProvenanceSource, build_plan,
    evaluate, format_human_output, load_methods, parse_methods,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Callable, Dataset, DeferredExpr, EvaluationOptions, GroundTruthSpec, IdAlignment,
        MethodMeta, MethodRegistry, MethodSpec, MethodUpdate, PostSpec, ResultBundle, Scalar,
        Scope, Value, Variants, builtins, evaluate, format_human_output,
    };
}

/// Run the BenchDesign CLI.
///
/// ```ignore
/// fn main() {
///     benchdesign::run().unwrap();
/// }
/// ```
pub use benchdesign_cli::run;
