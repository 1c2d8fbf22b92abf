//! Image stage: build, tag and push a container image.

use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::command::{run_checked, ToolRunner};
use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::{Artifact, ImageSettings};
use std::sync::Arc;

/// Length of the commit prefix used as the default tag.
pub const SHORT_COMMIT_LEN: usize = 12;

pub struct ImageStage {
    settings: ImageSettings,
    runner: Arc<dyn ToolRunner>,
}

impl ImageStage {
    pub fn new(settings: ImageSettings, runner: Arc<dyn ToolRunner>) -> Self {
        Self { settings, runner }
    }

    /// `registry/repository:tag` for the given context.
    pub fn reference(&self, context: &StageContext) -> String {
        let tag = self
            .settings
            .tag
            .clone()
            .or_else(|| context.trigger.short_commit(SHORT_COMMIT_LEN))
            .unwrap_or_else(|| "latest".to_string());
        format!(
            "{}/{}:{tag}",
            self.settings.registry.trim_end_matches('/'),
            self.settings.repository
        )
    }
}

#[async_trait]
impl Stage for ImageStage {
    async fn check_availability(&self) -> bool {
        self.runner.is_available("docker")
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        if self.settings.require_package && context.upstream_packages().is_empty() {
            return Err(StageError::ImagePush(
                "no package artifact was produced upstream".to_string(),
            )
            .into());
        }
        let username = context.secret(&self.settings.username_secret)?.clone();
        let password = context.secret(&self.settings.password_secret)?.clone();

        let reference = self.reference(context);
        let runner = self.runner.as_ref();
        let log = context.log_sink();

        let build = context.tool_with(
            "docker",
            [
                "build",
                "-f",
                self.settings.dockerfile.as_str(),
                "-t",
                reference.as_str(),
                self.settings.context.as_str(),
            ],
        );
        run_checked(runner, &build, log, |msg| {
            StageError::ImagePush(format!("image build failed: {msg}"))
        })
        .await?;

        let login = context
            .tool_with(
                "docker",
                [
                    "login",
                    self.settings.registry.as_str(),
                    "--username",
                    username.expose(),
                    "--password-stdin",
                ],
            )
            .stdin(password);
        run_checked(runner, &login, log, |msg| {
            StageError::ImagePush(format!("registry login failed: {msg}"))
        })
        .await?;

        let push = context.tool_with("docker", ["push", reference.as_str()]);
        run_checked(runner, &push, log, |msg| {
            StageError::ImagePush(format!("push rejected: {msg}"))
        })
        .await?;

        context.log(format!("pushed {reference}"));
        Ok(StageOutput::new(vec![Artifact::Image { reference }]))
    }
}
