//! Subprocess execution for stage adapters.
//!
//! Every external tool (mvn, trivy, docker, gcloud, kubectl, ...) is run
//! through a [`ToolRunner`]. The real implementation is [`ProcessRunner`];
//! tests substitute a scripted runner.

use crate::secrets::Secret;
use crate::stages::base::StageError;
use crate::stages::context::LogSink;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};

/// A fully described tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    /// Secrets passed as environment variables.
    pub secret_env: BTreeMap<String, Secret>,
    /// Variables removed from the inherited environment.
    pub env_remove: Vec<String>,
    /// Secret written to the tool's stdin, e.g. `--password-stdin`.
    pub stdin: Option<Secret>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir,
            env: BTreeMap::new(),
            secret_env: BTreeMap::new(),
            env_remove: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn secret_env(mut self, key: impl Into<String>, secret: Secret) -> Self {
        self.secret_env.insert(key.into(), secret);
        self
    }

    pub fn env_remove(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.env_remove.extend(names);
        self
    }

    pub fn stdin(mut self, secret: Secret) -> Self {
        self.stdin = Some(secret);
        self
    }

    /// `program arg1 arg2 ...`, for logs and error messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    /// Captured stdout, masked.
    pub stdout: Vec<String>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external tools.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Whether `program` can be found.
    fn is_available(&self, program: &str) -> bool;

    /// Run to completion, forwarding every output line to `log`.
    ///
    /// A non-zero exit is not an error here; only failing to start or
    /// observe the tool is.
    async fn run(&self, invocation: &ToolInvocation, log: &LogSink)
        -> Result<ToolOutput, StageError>;
}

/// Run `invocation` and turn a non-zero exit into `fail(description)`.
pub async fn run_checked(
    runner: &dyn ToolRunner,
    invocation: &ToolInvocation,
    log: &LogSink,
    fail: impl FnOnce(String) -> StageError,
) -> Result<ToolOutput, StageError> {
    let output = runner.run(invocation, log).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(fail(format!(
            "`{}` exited with code {}",
            log.mask(&invocation.command_line()),
            output.exit_code
        )))
    }
}

/// One observation of a running tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolLine {
    Stdout(String),
    Stderr(String),
    Exited(i32),
}

/// Runs tools as local subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Spawn `invocation` and stream its stdout and stderr lines, ending
    /// with [`ToolLine::Exited`].
    pub fn stream(
        invocation: &ToolInvocation,
    ) -> Pin<Box<dyn Stream<Item = Result<ToolLine, StageError>> + Send>> {
        let invocation = invocation.clone();

        let stream = async_stream::stream! {
            let mut cmd = Command::new(&invocation.program);
            cmd.args(&invocation.args);
            cmd.current_dir(&invocation.working_dir);
            for name in &invocation.env_remove {
                cmd.env_remove(name);
            }
            cmd.envs(&invocation.env);
            for (key, secret) in &invocation.secret_env {
                cmd.env(key, secret.expose());
            }
            cmd.stdin(if invocation.stdin.is_some() { Stdio::piped() } else { Stdio::null() });
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    yield Err(StageError::Execution(format!(
                        "Failed to spawn command '{}': {e}",
                        invocation.program
                    )));
                    return;
                }
            };

            if let (Some(secret), Some(mut stdin)) = (&invocation.stdin, child.stdin.take()) {
                if let Err(e) = stdin.write_all(secret.expose().as_bytes()).await {
                    yield Err(StageError::Execution(format!(
                        "Failed to write stdin of '{}': {e}",
                        invocation.program
                    )));
                    return;
                }
                // Dropping closes the pipe so the tool sees EOF.
                drop(stdin);
            }

            let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
                yield Err(StageError::Execution(
                    "Failed to capture tool output".to_string()
                ));
                return;
            };

            let stdout = LinesStream::new(BufReader::new(stdout).lines())
                .map(|line| line.map(ToolLine::Stdout));
            let stderr = LinesStream::new(BufReader::new(stderr).lines())
                .map(|line| line.map(ToolLine::Stderr));
            let mut lines = stdout.merge(stderr);

            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => yield Ok(line),
                    Err(e) => {
                        yield Err(StageError::Execution(format!(
                            "Failed to read output of '{}': {e}",
                            invocation.program
                        )));
                        return;
                    }
                }
            }

            match child.wait().await {
                // Killed by a signal when there is no code.
                Ok(status) => yield Ok(ToolLine::Exited(status.code().unwrap_or(-1))),
                Err(e) => yield Err(StageError::Execution(format!(
                    "Failed to wait for '{}': {e}",
                    invocation.program
                ))),
            }
        };

        Box::pin(stream)
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    async fn run(
        &self,
        invocation: &ToolInvocation,
        log: &LogSink,
    ) -> Result<ToolOutput, StageError> {
        tracing::debug!(program = %invocation.program, "spawning tool");
        let mut stream = Self::stream(invocation);
        let mut stdout = Vec::new();

        while let Some(line) = stream.next().await {
            match line? {
                ToolLine::Stdout(line) => {
                    log.line(&line);
                    stdout.push(log.mask(&line));
                }
                ToolLine::Stderr(line) => log.line(&line),
                ToolLine::Exited(exit_code) => return Ok(ToolOutput { exit_code, stdout }),
            }
        }

        Err(StageError::Execution(format!(
            "'{}' ended without an exit status",
            invocation.program
        )))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::secrets::Secret;

    fn sh(script: &str) -> ToolInvocation {
        ToolInvocation::new("sh", PathBuf::from(".")).args(["-c", script])
    }

    #[tokio::test]
    async fn test_stream_stdout_and_exit() {
        let lines: Vec<_> = ProcessRunner::stream(&sh("echo one; echo two"))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .expect("tool should run");

        assert_eq!(
            lines,
            vec![
                ToolLine::Stdout("one".to_string()),
                ToolLine::Stdout("two".to_string()),
                ToolLine::Exited(0),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_invalid_command() {
        let invocation = ToolInvocation::new("nonexistent-command-xyz", PathBuf::from("."));
        let results: Vec<_> = ProcessRunner::stream(&invocation).collect().await;

        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(StageError::Execution(msg)) => assert!(msg.contains("Failed to spawn command")),
            other => panic!("Expected Execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_reports_exit_code_and_logs_stderr() {
        let (sink, mut rx) = LogSink::channel();
        let output = ProcessRunner::new()
            .run(&sh("echo out; echo err >&2; exit 3"), &sink)
            .await
            .unwrap();

        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout, vec!["out".to_string()]);
        drop(sink);

        let mut logged = Vec::new();
        while let Some(line) = rx.recv().await {
            logged.push(line);
        }
        logged.sort();
        assert_eq!(logged, vec!["err".to_string(), "out".to_string()]);
    }

    #[tokio::test]
    async fn test_run_passes_secret_env_and_stdin() {
        let invocation = sh("read input; echo \"$TOKEN/$input\"")
            .secret_env("TOKEN", Secret::new("tok"))
            .stdin(Secret::new("pw\n"));
        let output = ProcessRunner::new()
            .run(&invocation, &LogSink::default())
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, vec!["tok/pw".to_string()]);
    }

    #[tokio::test]
    async fn test_run_removes_withheld_env() {
        std::env::set_var("SHIPLINE_WITHHELD_TEST_VAR", "leak");
        let invocation = sh("echo \"[${SHIPLINE_WITHHELD_TEST_VAR:-}]\"")
            .env_remove(["SHIPLINE_WITHHELD_TEST_VAR".to_string()]);
        let output = ProcessRunner::new()
            .run(&invocation, &LogSink::default())
            .await
            .unwrap();

        assert_eq!(output.stdout, vec!["[]".to_string()]);
    }

    #[tokio::test]
    async fn test_run_checked_maps_failure() {
        let err = run_checked(
            &ProcessRunner::new(),
            &sh("exit 1"),
            &LogSink::default(),
            StageError::Build,
        )
        .await
        .unwrap_err();

        match err {
            StageError::Build(msg) => assert!(msg.contains("exited with code 1")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_is_available() {
        assert!(ProcessRunner::new().is_available("sh"));
        assert!(!ProcessRunner::new().is_available("nonexistent-command-xyz"));
    }

    #[test]
    fn test_command_line() {
        let invocation = ToolInvocation::new("docker", PathBuf::from("."))
            .args(["push", "acme/app:1"]);
        assert_eq!(invocation.command_line(), "docker push acme/app:1");
    }
}
