//! Directory structure and file generation for `.shipline/` initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::loader::CONFIG_DIR;
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline written when only one is wanted.
const MINIMAL_PIPELINE: &str = "pipelines/delivery.yaml";

/// Options for initializing a .shipline directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Target directory where .shipline will be created.
    pub target_dir: PathBuf,

    /// Overwrite existing .shipline directory if it exists.
    pub force: bool,

    /// Write only the delivery pipeline.
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Generate a `.shipline/` directory with the embedded templates.
///
/// ```text
/// .shipline/
/// ├── config.toml
/// └── pipelines/
///     ├── delivery.yaml
///     └── ci.yaml (unless minimal)
/// ```
///
/// Returns the paths written, relative to `.shipline/`.
///
/// # Example
/// ```no_run
/// use sl_core::init::{generate_shipline_structure, InitOptions};
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let options = InitOptions {
///     target_dir: PathBuf::from("."),
///     force: false,
///     minimal: false,
/// };
///
/// generate_shipline_structure(options).await?;
/// # Ok(())
/// # }
/// ```
pub async fn generate_shipline_structure(options: InitOptions) -> InitResult<Vec<String>> {
    let sl_dir = options.target_dir.join(CONFIG_DIR);

    if sl_dir.exists() && !options.force {
        return Err(InitError::DirectoryExists(sl_dir));
    }

    let pipelines_dir = sl_dir.join("pipelines");
    fs::create_dir_all(&pipelines_dir).map_err(|source| InitError::DirectoryCreate {
        path: pipelines_dir.clone(),
        source,
    })?;

    let mut written = vec!["config.toml".to_string()];
    if options.minimal {
        written.push(MINIMAL_PIPELINE.to_string());
    } else {
        written.extend(list_templates("pipelines/"));
    }

    for template_path in &written {
        write_template_file(&sl_dir, template_path)?;
    }

    Ok(written)
}

/// Write one embedded template to `sl_dir/<template_path>`.
fn write_template_file(sl_dir: &Path, template_path: &str) -> InitResult<()> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = sl_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path,
        source,
    })?;

    Ok(())
}
