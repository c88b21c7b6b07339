//! Configuration loading from benchdesign.toml
//!
//! BenchDesign configuration can be specified in a `benchdesign.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.

use crate::evaluate::IdAlignment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// BenchDesign configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BenchConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Runner configuration for method evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Run methods on a worker pool
    #[serde(default)]
    pub concurrent: bool,
    /// Number of workers in concurrent mode
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Id alignment: "off", "on", or "column:<name>"
    #[serde(default = "default_alignment")]
    pub alignment: String,
    /// One metadata column per parameter
    #[serde(default)]
    pub tabular_parameters: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            jobs: None,
            alignment: default_alignment(),
            tabular_parameters: false,
        }
    }
}

impl RunnerConfig {
    /// Parsed alignment mode
    pub fn id_alignment(&self) -> anyhow::Result<IdAlignment> {
        self.alignment.parse().map_err(|e: String| anyhow::anyhow!(e))
    }
}

fn default_alignment() -> String {
    "off".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human", "json", "csv"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl BenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let dir = std::env::current_dir().ok()?;
        Self::discover_from(&dir)
    }

    /// Walk up from `start` looking for `benchdesign.toml`
    pub fn discover_from(start: &Path) -> Option<Self> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join("benchdesign.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# BenchDesign Configuration
# https://github.com/ml-rust/benchdesign

[runner]
# Run methods on a worker pool
concurrent = false
# Number of workers in concurrent mode (uncomment to enable)
# jobs = 4
# Id alignment: "off", "on", or "column:<name>"
alignment = "off"
# One metadata column per parameter instead of a combined one
tabular_parameters = false

[output]
# Default output format: human, json, csv
format = "human"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert!(!config.runner.concurrent);
        assert_eq!(config.runner.alignment, "off");
        assert_eq!(config.output.format, "human");
        assert_eq!(config.runner.id_alignment().unwrap(), IdAlignment::Off);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            concurrent = true
            jobs = 3
            alignment = "column:gene"
        "#;

        let config: BenchConfig = toml::from_str(toml_str).unwrap();
        assert!(config.runner.concurrent);
        assert_eq!(config.runner.jobs, Some(3));
        assert_eq!(
            config.runner.id_alignment().unwrap(),
            IdAlignment::OnColumn("gene".to_string())
        );
        // Defaults should still apply
        assert_eq!(config.output.format, "human");
        assert!(!config.runner.tabular_parameters);
    }

    #[test]
    fn test_bad_alignment() {
        let config: BenchConfig = toml::from_str("[runner]\nalignment = \"maybe\"").unwrap();
        assert!(config.runner.id_alignment().is_err());
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = BenchConfig::default_toml();
        let config: BenchConfig = toml::from_str(&default_toml).unwrap();
        assert_eq!(config.runner.alignment, "off");
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(
            root.path().join("benchdesign.toml"),
            "[output]\nformat = \"json\"\n",
        )
        .unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = BenchConfig::discover_from(&nested).unwrap();
        assert_eq!(config.output.format, "json");
    }
}
