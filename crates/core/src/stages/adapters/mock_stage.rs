//! Mock stage implementation for testing.

use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::Artifact;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a mock stage saw when it ran.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenContext {
    pub secret_names: Vec<String>,
    pub upstream: Vec<Artifact>,
    pub withheld_env: Vec<String>,
}

#[derive(Clone)]
pub struct MockStage {
    available: bool,
    outcome: Result<Vec<Artifact>, StageFailure>,
    log_lines: Vec<String>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenContext>>>,
}

impl MockStage {
    pub fn new(available: bool, outcome: Result<Vec<Artifact>, StageFailure>) -> Self {
        Self {
            available,
            outcome,
            log_lines: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn success() -> Self {
        Self::new(true, Ok(Vec::new()))
    }

    pub fn producing(artifacts: Vec<Artifact>) -> Self {
        Self::new(true, Ok(artifacts))
    }

    pub fn failing(error: StageError) -> Self {
        Self::new(true, Err(error.into()))
    }

    pub fn unavailable() -> Self {
        Self::new(false, Ok(Vec::new()))
    }

    /// Emit `line` through the context log on every run.
    pub fn logging(mut self, line: impl Into<String>) -> Self {
        self.log_lines.push(line.into());
        self
    }

    /// Shared counter of executions.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Contexts seen so far. Clones share the same record.
    pub fn seen(&self) -> Vec<SeenContext> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Stage for MockStage {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        if !self.available {
            return Err(StageError::NotAvailable("Mock stage not available".to_string()).into());
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(SeenContext {
                secret_names: context.secrets.names(),
                upstream: context.upstream.clone(),
                withheld_env: context.withheld_env.clone(),
            });
        }
        for line in &self.log_lines {
            context.log(line);
        }

        self.outcome.clone().map(StageOutput::new)
    }
}
