//! Shell stage: run an arbitrary command in the workspace.

use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::command::{run_checked, ToolRunner};
use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::ShellSettings;
use std::sync::Arc;

pub struct ShellStage {
    settings: ShellSettings,
    runner: Arc<dyn ToolRunner>,
}

impl ShellStage {
    pub fn new(settings: ShellSettings, runner: Arc<dyn ToolRunner>) -> Self {
        Self { settings, runner }
    }
}

#[async_trait]
impl Stage for ShellStage {
    async fn check_availability(&self) -> bool {
        self.settings
            .command
            .first()
            .is_some_and(|program| self.runner.is_available(program))
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        let mut invocation = context.tool(&self.settings.command)?;
        for (key, value) in &self.settings.env {
            invocation = invocation.env(key.clone(), value.clone());
        }
        // Declared secrets are exported under their own names.
        for name in context.secrets.names() {
            if let Some(secret) = context.secrets.get(&name) {
                invocation = invocation.secret_env(name, secret.clone());
            }
        }

        run_checked(
            self.runner.as_ref(),
            &invocation,
            context.log_sink(),
            StageError::Execution,
        )
        .await?;
        Ok(StageOutput::empty())
    }
}
