//! Configuration file loader for `.shipline/` directory structure.
//!
//! This module provides functionality to load and parse all configuration files
//! from the `.shipline/` directory, including:
//! - `config.toml`: Global settings
//! - `pipelines/*.yaml`: Pipeline definitions
//!
//! Every pipeline is planned while loading, so a definition with a
//! dependency cycle or an unknown `needs` entry is rejected before any
//! stage can run.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use crate::engine::plan::execution_order;
use sl_protocol::config_models::GlobalConfig;
use sl_protocol::pipeline_models::Pipeline;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory holding all shipline configuration, relative to the repository root.
pub const CONFIG_DIR: &str = ".shipline";

/// Loads all configuration from the `.shipline/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.shipline/` folder
///
/// # Returns
///
/// An `AppConfig` containing all loaded configuration. If directories or files
/// are missing (but the root exists), returns an empty/default configuration
/// rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid syntax (TOML or YAML)
/// - A pipeline cannot be planned, or two files define the same pipeline name
///
/// # Example
///
/// ```rust,no_run
/// use sl_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} pipelines", config.pipelines.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let sl_dir = root.join(CONFIG_DIR);

    if !sl_dir.exists() {
        return Ok(AppConfig::default());
    }

    let global = load_global_config(&sl_dir)?;
    let pipelines = load_pipelines(&sl_dir)?;

    Ok(AppConfig { global, pipelines })
}

/// Loads global configuration from `config.toml`.
fn load_global_config(sl_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = sl_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: GlobalConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path,
            source,
        })?;

    Ok(config)
}

/// Loads all pipeline definitions from `pipelines/*.yaml`.
fn load_pipelines(sl_dir: &Path) -> ConfigResult<Vec<Pipeline>> {
    let pipelines_dir = sl_dir.join("pipelines");

    if !pipelines_dir.exists() {
        return Ok(Vec::new());
    }

    let mut pipelines = Vec::new();
    let mut defined_in: HashMap<String, PathBuf> = HashMap::new();

    for entry in WalkDir::new(&pipelines_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: pipelines_dir.clone(),
            source,
        })?;

        let path = entry.path();

        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let pipeline: Pipeline =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        execution_order(&pipeline).map_err(|e| ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if let Some(first) = defined_in.get(&pipeline.name) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!(
                    "pipeline '{}' is already defined in {}",
                    pipeline.name,
                    first.display()
                ),
            });
        }
        defined_in.insert(pipeline.name.clone(), path.to_path_buf());

        pipelines.push(pipeline);
    }

    Ok(pipelines)
}
