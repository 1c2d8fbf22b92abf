//! Scripted tool runner for tests.
//!
//! `ScriptedRunner` never spawns anything. Each call is matched against the
//! registered rules by command-line prefix; the first matching rule decides
//! the exit code and output. Unmatched calls succeed silently. Every call is
//! recorded so tests can assert on the exact tool sequence.

use crate::stages::base::StageError;
use crate::stages::command::{ToolInvocation, ToolOutput, ToolRunner};
use crate::stages::context::LogSink;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// What a scripted tool call returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedResponse {
    pub exit_code: i32,
    pub lines: Vec<String>,
}

impl ScriptedResponse {
    pub fn exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

type Responder = Arc<dyn Fn(&ToolInvocation) -> ScriptedResponse + Send + Sync>;

struct Rule {
    prefix: String,
    responder: Responder,
}

#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<ToolInvocation>>,
    missing: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls whose command line starts with `prefix` exit with `exit_code`.
    pub fn respond(self, prefix: impl Into<String>, exit_code: i32) -> Self {
        self.respond_with(prefix, move |_| ScriptedResponse::exit(exit_code))
    }

    /// Calls whose command line starts with `prefix` are answered by
    /// `responder`, which may also touch the filesystem the way the real
    /// tool would.
    pub fn respond_with<F>(self, prefix: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&ToolInvocation) -> ScriptedResponse + Send + Sync + 'static,
    {
        lock(&self.rules).push(Rule {
            prefix: prefix.into(),
            responder: Arc::new(responder),
        });
        self
    }

    /// Report `program` as not installed.
    pub fn missing(self, program: impl Into<String>) -> Self {
        lock(&self.missing).insert(program.into());
        self
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        lock(&self.calls).clone()
    }

    /// Command lines of every call so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(ToolInvocation::command_line)
            .collect()
    }

    /// Calls whose command line starts with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<ToolInvocation> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.command_line().starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    fn is_available(&self, program: &str) -> bool {
        !lock(&self.missing).contains(program)
    }

    async fn run(
        &self,
        invocation: &ToolInvocation,
        log: &LogSink,
    ) -> Result<ToolOutput, StageError> {
        lock(&self.calls).push(invocation.clone());

        if !self.is_available(&invocation.program) {
            return Err(StageError::Execution(format!(
                "Failed to spawn command '{}': not found",
                invocation.program
            )));
        }

        let command_line = invocation.command_line();
        let responder = lock(&self.rules)
            .iter()
            .find(|rule| command_line.starts_with(&rule.prefix))
            .map(|rule| Arc::clone(&rule.responder));
        let response = responder.map_or_else(ScriptedResponse::default, |r| r(invocation));

        for line in &response.lines {
            log.line(line);
        }
        Ok(ToolOutput {
            exit_code: response.exit_code,
            stdout: response.lines.iter().map(|l| log.mask(l)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn call(command: &str) -> ToolInvocation {
        let mut parts = command.split_whitespace();
        let program = parts.next().unwrap_or_default();
        ToolInvocation::new(program, PathBuf::from(".")).args(parts)
    }

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let runner = ScriptedRunner::new()
            .respond("kubectl get namespace", 1)
            .respond("kubectl", 0);

        let sink = LogSink::default();
        let get = runner.run(&call("kubectl get namespace prod"), &sink).await.unwrap();
        let apply = runner.run(&call("kubectl apply -f k8s"), &sink).await.unwrap();

        assert_eq!(get.exit_code, 1);
        assert_eq!(apply.exit_code, 0);
        assert_eq!(
            runner.command_lines(),
            vec!["kubectl get namespace prod", "kubectl apply -f k8s"]
        );
    }

    #[tokio::test]
    async fn test_unmatched_calls_succeed() {
        let runner = ScriptedRunner::new();
        let output = runner.run(&call("mvn -B package"), &LogSink::default()).await.unwrap();
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ScriptedRunner::new().missing("trivy");
        assert!(!runner.is_available("trivy"));
        assert!(runner.is_available("gitleaks"));
        let result = runner.run(&call("trivy fs ."), &LogSink::default()).await;
        assert!(matches!(result, Err(StageError::Execution(_))));
    }

    #[tokio::test]
    async fn test_output_lines_are_logged() {
        let runner = ScriptedRunner::new().respond_with("mvn", |_| {
            ScriptedResponse::exit(0).with_line("BUILD SUCCESS")
        });
        let (sink, mut rx) = LogSink::channel();
        let output = runner.run(&call("mvn test"), &sink).await.unwrap();

        assert_eq!(output.stdout, vec!["BUILD SUCCESS".to_string()]);
        assert_eq!(rx.recv().await.as_deref(), Some("BUILD SUCCESS"));
    }
}
