//! Runtime run state models.
//!
//! This module defines the structures for tracking a single pipeline run:
//! its trigger, its status, and the results of the stages it executed.

use crate::artifact_models::Artifact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a pipeline run.
///
/// Pending -> Running -> Succeeded | Failed. Both end states are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run has been created but no stage has started.
    Pending,

    /// A stage is executing.
    Running,

    /// Every stage succeeded.
    Succeeded,

    /// A stage failed and the chain was halted.
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Outcome of one executed stage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Success,
    Failure,
}

/// The push event that started a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub branch: String,
    #[serde(default)]
    pub commit: Option<String>,
}

impl Trigger {
    pub fn push(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            commit: None,
        }
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// The first `len` characters of the commit, if known.
    pub fn short_commit(&self, len: usize) -> Option<String> {
        self.commit
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| c.chars().take(len).collect())
    }
}

/// The recorded result of one stage.
///
/// Results are appended to a run once and never modified afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StageResult {
    pub stage: String,
    pub status: StageStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Failure description for failed stages.
    #[serde(default)]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl StageResult {
    pub fn success(stage: impl Into<String>, artifacts: Vec<Artifact>) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Success,
            artifacts,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn failure(
        stage: impl Into<String>,
        error: impl Into<String>,
        artifacts: Vec<Artifact>,
    ) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Failure,
            artifacts,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Success
    }

    pub fn reports(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.is_report())
    }
}

/// Runtime state of a single pipeline run.
///
/// A run is created for each accepted trigger and holds one result per
/// executed stage. Stages after a failure are absent.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PipelineRun {
    pub id: Uuid,

    pub pipeline_name: String,

    pub trigger: Trigger,

    pub status: RunStatus,

    /// Stage currently executing, if any.
    #[serde(default)]
    pub current_stage: Option<String>,

    /// Results in execution order.
    pub results: Vec<StageResult>,

    /// Accumulated log lines from every executed stage.
    #[serde(default)]
    pub logs: Vec<String>,

    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// The result recorded for `stage`, if it ran.
    pub fn result(&self, stage: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == stage)
    }

    /// The result of the stage that halted the run.
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.results.iter().find(|r| !r.is_success())
    }

    /// Artifacts produced by every executed stage, in execution order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.results.iter().flat_map(|r| r.artifacts.iter())
    }
}
