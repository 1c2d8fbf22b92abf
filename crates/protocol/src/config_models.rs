//! Global configuration models for `.shipline/config.toml`.

use serde::Deserialize;
use serde::Serialize;

fn default_runs_dir() -> String {
    ".shipline/runs".to_string()
}

fn default_true() -> bool {
    true
}

/// Represents global settings from `.shipline/config.toml`.
///
/// # Example
///
/// ```toml
/// # .shipline/config.toml
/// default_pipeline = "delivery"
/// runs_dir = ".shipline/runs"
/// keep_run_records = true
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Pipeline started when none is named explicitly.
    #[serde(default)]
    pub default_pipeline: Option<String>,

    /// Directory (relative to the repository root) for run records.
    #[serde(default = "default_runs_dir")]
    pub runs_dir: String,

    /// Write a JSON record of every finished run.
    #[serde(default = "default_true")]
    pub keep_run_records: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_pipeline: None,
            runs_dir: default_runs_dir(),
            keep_run_records: true,
        }
    }
}
