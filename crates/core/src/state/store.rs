//! Run records on disk.
//!
//! Each finished run is written as `<runs_dir>/<run-id>.json`. Records hold
//! results, artifacts and masked logs; secrets have no serialized form and
//! never reach them.

use anyhow::{Context, Result};
use sl_protocol::PipelineRun;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Write `run`, replacing any earlier record with the same id.
    pub fn save(&self, run: &PipelineRun) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create runs directory {}", self.dir.display()))?;
        let path = self.path_for(run.id);
        let json = serde_json::to_string_pretty(run).context("Failed to serialize run")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write run record {}", path.display()))?;
        Ok(path)
    }

    pub fn load(&self, id: Uuid) -> Result<PipelineRun> {
        let path = self.path_for(id);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("No run record at {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse run record {}", path.display()))
    }

    /// Every readable record, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<PipelineRun>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs: Vec<PipelineRun> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|entry| {
                let json = std::fs::read_to_string(entry.path()).ok()?;
                match serde_json::from_str::<PipelineRun>(&json) {
                    Ok(run) => Some(run),
                    Err(e) => {
                        tracing::warn!(
                            path = %entry.path().display(),
                            error = %e,
                            "skipping unreadable run record"
                        );
                        None
                    }
                }
            })
            .collect();

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    pub fn latest(&self) -> Result<Option<PipelineRun>> {
        Ok(self.list()?.into_iter().next())
    }
}
