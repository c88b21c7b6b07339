//! JSON Output

use crate::report::ResultBundle;

/// Current bundle schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Generate a prettified JSON bundle.
pub fn generate_json_report(bundle: &ResultBundle) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(bundle)
}

/// Read a bundle previously written by [`generate_json_report`].
pub fn parse_json_report(text: &str) -> Result<ResultBundle, serde_json::Error> {
    serde_json::from_str(text)
}
