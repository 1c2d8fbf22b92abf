//! Quality-gate service client.
//!
//! After static analysis is submitted, the analysis server processes it in
//! the background. The quality-gate stage polls the background task until it
//! finishes, then asks for the gate verdict of the resulting analysis.

mod error;
mod sonar;

pub use error::{QualityGateClientError, Result};
pub use sonar::SonarQubeService;

use crate::secrets::Secret;
use async_trait::async_trait;
use std::fmt;

/// State of a submitted analysis on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisTask {
    /// Queued or still being processed.
    Pending,
    /// Processed; the verdict is available for `analysis_id`.
    Completed { analysis_id: String },
    /// The server failed or canceled processing.
    Aborted { reason: String },
}

/// Verdict of a quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Ok,
    Warn,
    Error,
    /// No gate is associated with the project.
    None,
}

impl GateStatus {
    pub fn from_label(label: &str) -> Self {
        match label {
            "OK" => Self::Ok,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            _ => Self::None,
        }
    }

    /// Whether the pipeline may proceed. A project without a gate is not
    /// considered gated.
    pub fn passes(self) -> bool {
        matches!(self, Self::Ok | Self::Warn)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::None => "NONE",
        }
    }
}

/// One gate condition as evaluated by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateCondition {
    pub metric: String,
    pub status: GateStatus,
    pub comparator: String,
    pub threshold: String,
    pub actual: String,
}

impl fmt::Display for GateCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The comparator names the failing side: LT fails when below.
        let op = match self.comparator.as_str() {
            "LT" => "<",
            "GT" => ">",
            other => other,
        };
        write!(f, "{} {} {op} {}", self.metric, self.actual, self.threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVerdict {
    pub status: GateStatus,
    pub conditions: Vec<GateCondition>,
}

impl GateVerdict {
    /// Conditions that did not pass.
    pub fn failed_conditions(&self) -> impl Iterator<Item = &GateCondition> {
        self.conditions
            .iter()
            .filter(|condition| !condition.status.passes())
    }
}

/// Client for an analysis server.
#[async_trait]
pub trait QualityGateService: Send + Sync {
    async fn task_status(&self, host: &str, token: &Secret, task_id: &str) -> Result<AnalysisTask>;

    async fn gate_verdict(
        &self,
        host: &str,
        token: &Secret,
        analysis_id: &str,
    ) -> Result<GateVerdict>;
}

/// Extract the background task id from the scanner's `report-task.txt`.
pub fn parse_report_task(contents: &str) -> Option<String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "ceTaskId")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
