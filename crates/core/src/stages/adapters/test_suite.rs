//! Test stage: run the automated test suite.

use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::command::ToolRunner;
use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::{Artifact, TestSettings};
use std::sync::Arc;

pub struct TestSuiteStage {
    settings: TestSettings,
    runner: Arc<dyn ToolRunner>,
}

impl TestSuiteStage {
    pub fn new(settings: TestSettings, runner: Arc<dyn ToolRunner>) -> Self {
        Self { settings, runner }
    }
}

#[async_trait]
impl Stage for TestSuiteStage {
    async fn check_availability(&self) -> bool {
        self.settings
            .command
            .first()
            .is_some_and(|program| self.runner.is_available(program))
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        let invocation = context.tool(&self.settings.command)?;
        let output = self.runner.run(&invocation, context.log_sink()).await?;

        // Reports are kept on failure too; they explain it.
        let reports: Vec<Artifact> = context
            .workspace
            .join(&self.settings.reports_dir)
            .is_dir()
            .then(|| Artifact::report("test-reports", self.settings.reports_dir.clone()))
            .into_iter()
            .collect();

        if output.success() {
            Ok(StageOutput::new(reports))
        } else {
            Err(StageFailure::with_artifacts(
                StageError::TestFailure(format!(
                    "`{}` exited with code {}",
                    invocation.command_line(),
                    output.exit_code
                )),
                reports,
            ))
        }
    }
}
