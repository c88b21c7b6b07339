#![warn(missing_docs)]
//! BenchDesign Core - Method Definitions
//!
//! This crate holds everything that exists before an evaluation runs:
//! - `Dataset`: the read-only field set methods are resolved against
//! - `MethodSpec`: a labelled primary callable with deferred parameters,
//!   post-processing and metadata
//! - `MethodRegistry`: the ordered, immutable collection of methods and its
//!   add / modify / expand / drop mutations

mod dataset;
mod describe;
mod method;
mod registry;

pub use dataset::{Dataset, DatasetError};
pub use method::{
    DEFAULT_CHANNEL, MethodMeta, MethodSpec, MethodUpdate, PostShape, PostSpec,
    ProvenanceOverride, RESERVED_KEYS,
};
pub use registry::{DefinitionError, MethodRegistry, Variants};

#[doc(hidden)]
pub use dataset::json_to_scalar;
