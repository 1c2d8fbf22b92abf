//! Execution context handed to a stage.

use crate::secrets::{mask_line, ScopedSecrets, Secret};
use crate::stages::base::StageError;
use crate::stages::command::ToolInvocation;
use sl_protocol::{Artifact, Trigger};
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Destination for a stage's output lines.
///
/// Every line is masked against the stage's secrets before it leaves the
/// sink. Without a channel, lines are dropped.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    tx: Option<mpsc::UnboundedSender<String>>,
    masks: Vec<String>,
}

impl LogSink {
    /// A sink plus the receiver its lines arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                masks: Vec::new(),
            },
            rx,
        )
    }

    pub fn line(&self, line: impl AsRef<str>) {
        if let Some(tx) = &self.tx {
            // The receiver may be gone once the engine stops listening.
            let _ = tx.send(self.mask(line.as_ref()));
        }
    }

    pub fn mask(&self, line: &str) -> String {
        mask_line(line, &self.masks)
    }
}

/// Context information passed to stages during execution.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub run_id: Uuid,

    pub pipeline_name: String,

    pub stage_name: String,

    /// Checkout the tools run in.
    pub workspace: PathBuf,

    pub trigger: Trigger,

    /// Artifacts of every successful stage that ran before this one.
    pub upstream: Vec<Artifact>,

    /// Secrets declared by this stage, and only those.
    pub secrets: ScopedSecrets,

    /// Secret names declared by other stages. Tools never inherit these
    /// from the environment.
    pub withheld_env: Vec<String>,

    log: LogSink,
}

impl StageContext {
    /// Create a context for `stage_name` running in `workspace`.
    ///
    /// Defaults:
    /// - run_id: fresh
    /// - trigger: push to `main`
    /// - no upstream artifacts, secrets or log channel
    pub fn new(stage_name: impl Into<String>, workspace: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: String::new(),
            stage_name: stage_name.into(),
            workspace,
            trigger: Trigger::push("main"),
            upstream: Vec::new(),
            secrets: ScopedSecrets::new(),
            withheld_env: Vec::new(),
            log: LogSink::default(),
        }
    }

    pub fn with_run(mut self, run_id: Uuid, pipeline_name: impl Into<String>) -> Self {
        self.run_id = run_id;
        self.pipeline_name = pipeline_name.into();
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_upstream(mut self, artifacts: Vec<Artifact>) -> Self {
        self.upstream = artifacts;
        self
    }

    pub fn with_secrets(mut self, secrets: ScopedSecrets) -> Self {
        self.log.masks = secrets.mask_fragments();
        self.secrets = secrets;
        self
    }

    pub fn with_withheld_env(mut self, names: Vec<String>) -> Self {
        self.withheld_env = names;
        self
    }

    /// Send output to `sink`. Masks already set on the context are kept.
    pub fn with_log(mut self, sink: LogSink) -> Self {
        self.log.tx = sink.tx;
        self
    }

    /// Emit one line of stage output.
    pub fn log(&self, line: impl AsRef<str>) {
        self.log.line(line);
    }

    pub fn log_sink(&self) -> &LogSink {
        &self.log
    }

    pub fn secret(&self, name: &str) -> Result<&Secret, StageError> {
        self.secrets.require(name)
    }

    /// Package paths produced upstream.
    pub fn upstream_packages(&self) -> Vec<&str> {
        self.upstream.iter().filter_map(Artifact::package_path).collect()
    }

    /// The most recent image pushed upstream.
    pub fn upstream_image(&self) -> Option<&str> {
        self.upstream.iter().rev().find_map(Artifact::image_reference)
    }

    /// A tool invocation rooted at the workspace. `command` is program
    /// first.
    pub fn tool(&self, command: &[String]) -> Result<ToolInvocation, StageError> {
        let (program, args) = command.split_first().ok_or_else(|| {
            StageError::Execution(format!("stage '{}' has an empty command", self.stage_name))
        })?;
        Ok(self.tool_with(program, args.iter().cloned()))
    }

    pub fn tool_with(
        &self,
        program: &str,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> ToolInvocation {
        ToolInvocation::new(program, self.workspace.clone())
            .args(args)
            .env_remove(self.withheld_env.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let context = StageContext::new("build", PathBuf::from("/work"));
        assert_eq!(context.stage_name, "build");
        assert_eq!(context.trigger.branch, "main");
        assert!(context.upstream.is_empty());
        assert!(context.secrets.is_empty());
    }

    #[tokio::test]
    async fn test_log_lines_are_masked() {
        let (sink, mut rx) = LogSink::channel();
        let context = StageContext::new("image", PathBuf::from("."))
            .with_secrets(ScopedSecrets::new().with("TOKEN", Secret::new("s3cr3t-value")))
            .with_log(sink);

        context.log("password is s3cr3t-value");
        assert_eq!(rx.recv().await.as_deref(), Some("password is ***"));
    }

    #[tokio::test]
    async fn test_log_order_of_builders_does_not_matter() {
        let (sink, mut rx) = LogSink::channel();
        let context = StageContext::new("image", PathBuf::from("."))
            .with_log(sink)
            .with_secrets(ScopedSecrets::new().with("TOKEN", Secret::new("s3cr3t-value")));

        context.log("s3cr3t-value");
        assert_eq!(rx.recv().await.as_deref(), Some("***"));
    }

    #[test]
    fn test_upstream_lookups() {
        let context = StageContext::new("deploy", PathBuf::from(".")).with_upstream(vec![
            Artifact::Package {
                path: "target/app.jar".to_string(),
            },
            Artifact::Image {
                reference: "docker.io/acme/app:abc".to_string(),
            },
        ]);
        assert_eq!(context.upstream_packages(), vec!["target/app.jar"]);
        assert_eq!(context.upstream_image(), Some("docker.io/acme/app:abc"));
    }

    #[test]
    fn test_tool_from_empty_command() {
        let context = StageContext::new("shell", PathBuf::from("."));
        assert!(matches!(context.tool(&[]), Err(StageError::Execution(_))));
    }

    #[test]
    fn test_tool_withholds_foreign_secrets() {
        let context = StageContext::new("build", PathBuf::from("/work"))
            .with_withheld_env(vec!["GCP_SA_KEY".to_string()]);
        let invocation = context
            .tool(&["mvn".to_string(), "package".to_string()])
            .unwrap();
        assert_eq!(invocation.program, "mvn");
        assert_eq!(invocation.args, vec!["package".to_string()]);
        assert_eq!(invocation.working_dir, PathBuf::from("/work"));
        assert_eq!(invocation.env_remove, vec!["GCP_SA_KEY".to_string()]);
    }
}
