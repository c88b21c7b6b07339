//! Method Planner
//!
//! Narrows a registry to the methods a run should evaluate.
//!
//! Filtering: regex pattern matching on method labels. Selection keeps
//! registry order, since table columns and metadata rows follow it.

use benchdesign_core::MethodRegistry;
use regex::Regex;

/// Methods whose label matches `filter`, in registry order
pub fn build_plan(registry: &MethodRegistry, filter: Option<&Regex>) -> MethodRegistry {
    match filter {
        Some(re) => registry.retain(|label| re.is_match(label)),
        None => registry.clone(),
    }
}
