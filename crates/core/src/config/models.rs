//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines
//! global settings and pipeline definitions into a single configuration
//! object.

use crate::config::error::{ConfigError, ConfigResult};
use sl_protocol::config_models::GlobalConfig;
use sl_protocol::pipeline_models::Pipeline;

/// Unified application configuration loaded from `.shipline/` directory.
///
/// This structure aggregates all configuration sources:
/// - `config.toml`: Global settings
/// - `pipelines/*.yaml`: Pipeline definitions
///
/// # Example
///
/// ```rust,no_run
/// use sl_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// let pipeline = config.select_pipeline(None)?;
/// println!("Running {} ({} stages)", pipeline.name, pipeline.stages.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Global settings from `config.toml`.
    pub global: GlobalConfig,

    /// All pipeline definitions loaded from `pipelines/*.yaml`, in file name
    /// order.
    pub pipelines: Vec<Pipeline>,
}

impl AppConfig {
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Choose the pipeline to run.
    ///
    /// An explicit `name` wins, then `default_pipeline` from `config.toml`.
    /// Without either, the single defined pipeline is used.
    pub fn select_pipeline(&self, name: Option<&str>) -> ConfigResult<&Pipeline> {
        if let Some(name) = name.or(self.global.default_pipeline.as_deref()) {
            return self
                .pipeline(name)
                .ok_or_else(|| ConfigError::PipelineNotFound(name.to_string()));
        }

        match self.pipelines.as_slice() {
            [only] => Ok(only),
            [] => Err(ConfigError::PipelineNotFound("<none defined>".to_string())),
            many => Err(ConfigError::AmbiguousPipeline(
                many.iter().map(|p| p.name.clone()).collect(),
            )),
        }
    }
}
