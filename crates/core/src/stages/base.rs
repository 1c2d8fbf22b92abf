//! Base Stage trait and supporting types.

use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::Artifact;
use thiserror::Error;

/// Why a stage failed.
///
/// The message of each variant becomes the `error` of the recorded
/// [`StageResult`](sl_protocol::StageResult).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Stage not available: {0}")]
    NotAvailable(String),
    #[error("Missing secret: {0}")]
    MissingSecret(String),
    #[error("Dependency not satisfied: {0}")]
    DependencyNotSatisfied(String),
    #[error("Build failed: {0}")]
    Build(String),
    #[error("Security scan could not run: {0}")]
    Scan(String),
    #[error("Security findings block the pipeline: {0}")]
    ScanFindings(String),
    #[error("Test failure: {0}")]
    TestFailure(String),
    #[error("Quality gate rejected: {0}")]
    QualityGateRejected(String),
    #[error("Quality gate timed out: {0}")]
    QualityGateTimeout(String),
    #[error("Image push failed: {0}")]
    ImagePush(String),
    #[error("Deploy authentication failed: {0}")]
    DeployAuth(String),
    #[error("Cluster unreachable: {0}")]
    ClusterUnreachable(String),
    #[error("Manifest apply rejected: {0}")]
    DeployApply(String),
    #[error("Execution failed: {0}")]
    Execution(String),
}

/// What a successful stage produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub artifacts: Vec<Artifact>,
}

impl StageOutput {
    pub fn new(artifacts: Vec<Artifact>) -> Self {
        Self { artifacts }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A failed stage, with whatever it produced before failing.
///
/// Scan and test reports stay attached to the failure so they can be
/// inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub error: StageError,
    pub artifacts: Vec<Artifact>,
}

impl StageFailure {
    pub fn with_artifacts(error: StageError, artifacts: Vec<Artifact>) -> Self {
        Self { error, artifacts }
    }
}

impl From<StageError> for StageFailure {
    fn from(error: StageError) -> Self {
        Self {
            error,
            artifacts: Vec::new(),
        }
    }
}

/// One unit of pipeline work.
///
/// Implementations drive external tools. Everything they need arrives in
/// the [`StageContext`]; they never look at other stages directly.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Whether the tools this stage drives are installed.
    async fn check_availability(&self) -> bool;

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure>;
}
