//! Quality gate stage: submit static analysis and block on the verdict.

use crate::quality::{
    parse_report_task, AnalysisTask, QualityGateClientError, QualityGateService,
};
use crate::secrets::Secret;
use crate::stages::base::{Stage, StageError, StageFailure, StageOutput};
use crate::stages::command::{run_checked, ToolRunner};
use crate::stages::context::StageContext;
use async_trait::async_trait;
use sl_protocol::{Artifact, QualityGateSettings};
use std::sync::Arc;
use std::time::Duration;

pub struct QualityGateStage {
    settings: QualityGateSettings,
    runner: Arc<dyn ToolRunner>,
    service: Arc<dyn QualityGateService>,
    poll_interval: Duration,
    timeout: Duration,
}

impl QualityGateStage {
    pub fn new(
        settings: QualityGateSettings,
        runner: Arc<dyn ToolRunner>,
        service: Arc<dyn QualityGateService>,
    ) -> Self {
        let poll_interval = Duration::from_secs(settings.poll_interval_secs);
        let timeout = Duration::from_secs(settings.timeout_secs);
        Self {
            settings,
            runner,
            service,
            poll_interval,
            timeout,
        }
    }

    /// Override the polling cadence with sub-second precision.
    pub fn with_polling(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.timeout = timeout;
        self
    }

    fn read_task_id(&self, context: &StageContext) -> Result<String, StageError> {
        let path = context.workspace.join(&self.settings.report_task_file);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            StageError::Execution(format!(
                "cannot read '{}': {e}",
                self.settings.report_task_file
            ))
        })?;
        parse_report_task(&contents).ok_or_else(|| {
            StageError::Execution(format!(
                "'{}' has no ceTaskId",
                self.settings.report_task_file
            ))
        })
    }

    /// Poll until the server finishes processing `task_id`.
    async fn poll_analysis(
        &self,
        context: &StageContext,
        host: &str,
        token: &Secret,
        task_id: &str,
    ) -> Result<String, StageError> {
        // Never spin without yielding to the timer.
        let interval = self.poll_interval.max(Duration::from_millis(1));
        loop {
            let task = self
                .service
                .task_status(host, token, task_id)
                .await
                .map_err(server_error)?;
            match task {
                AnalysisTask::Completed { analysis_id } => return Ok(analysis_id),
                AnalysisTask::Aborted { reason } => {
                    return Err(StageError::QualityGateRejected(format!(
                        "analysis did not complete: {reason}"
                    )))
                }
                AnalysisTask::Pending => {
                    context.log(format!("analysis {task_id} still processing"));
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    async fn wait_for_analysis(
        &self,
        context: &StageContext,
        host: &str,
        token: &Secret,
        task_id: &str,
    ) -> Result<String, StageError> {
        tokio::time::timeout(self.timeout, self.poll_analysis(context, host, token, task_id))
            .await
            .map_err(|_| {
                StageError::QualityGateTimeout(format!(
                    "analysis {task_id} not processed within {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
    }
}

fn server_error(error: QualityGateClientError) -> StageError {
    if error.is_auth_error() {
        StageError::QualityGateRejected(format!("analysis server refused the token: {error}"))
    } else {
        StageError::Execution(format!("analysis server: {error}"))
    }
}

#[async_trait]
impl Stage for QualityGateStage {
    async fn check_availability(&self) -> bool {
        [&self.settings.build_command, &self.settings.analysis_command]
            .into_iter()
            .filter_map(|command| command.first())
            .all(|program| self.runner.is_available(program))
    }

    async fn execute(&self, context: &StageContext) -> Result<StageOutput, StageFailure> {
        let host = context.secret(&self.settings.host_url_secret)?.clone();
        let token = context.secret(&self.settings.token_secret)?.clone();

        if !self.settings.build_command.is_empty() {
            let rebuild = context.tool(&self.settings.build_command)?;
            run_checked(self.runner.as_ref(), &rebuild, context.log_sink(), StageError::Build)
                .await?;
        }

        let analysis = context
            .tool(&self.settings.analysis_command)?
            .secret_env("SONAR_HOST_URL", host.clone())
            .secret_env("SONAR_TOKEN", token.clone());
        run_checked(self.runner.as_ref(), &analysis, context.log_sink(), |msg| {
            StageError::Execution(format!("static analysis submission failed: {msg}"))
        })
        .await?;

        let task_id = self.read_task_id(context)?;
        context.log(format!("waiting for analysis task {task_id}"));
        let analysis_id = self
            .wait_for_analysis(context, host.expose(), &token, &task_id)
            .await?;

        let verdict = self
            .service
            .gate_verdict(host.expose(), &token, &analysis_id)
            .await
            .map_err(server_error)?;

        let artifacts = vec![Artifact::QualityGate {
            analysis_id,
            status: verdict.status.label().to_string(),
        }];
        context.log(format!("quality gate {}", verdict.status.label()));

        if verdict.status.passes() {
            return Ok(StageOutput::new(artifacts));
        }

        let failed: Vec<String> = verdict
            .failed_conditions()
            .map(ToString::to_string)
            .collect();
        let reason = if failed.is_empty() {
            format!("gate status {}", verdict.status.label())
        } else {
            failed.join(", ")
        };
        Err(StageFailure::with_artifacts(
            StageError::QualityGateRejected(reason),
            artifacts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{GateCondition, GateStatus, GateVerdict, Result as ClientResult};
    use crate::secrets::ScopedSecrets;
    use crate::stages::command::ToolInvocation;
    use crate::stages::scripted::{ScriptedResponse, ScriptedRunner};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeGate {
        pending_polls: Mutex<usize>,
        status: GateStatus,
    }

    impl FakeGate {
        fn new(pending_polls: usize, status: GateStatus) -> Arc<Self> {
            Arc::new(Self {
                pending_polls: Mutex::new(pending_polls),
                status,
            })
        }
    }

    #[async_trait]
    impl QualityGateService for FakeGate {
        async fn task_status(
            &self,
            host: &str,
            token: &Secret,
            task_id: &str,
        ) -> ClientResult<AnalysisTask> {
            assert_eq!(host, "https://sonar.example.com");
            assert_eq!(token.expose(), "sq-token");
            assert_eq!(task_id, "TASK-1");
            let mut pending = self.pending_polls.lock().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Ok(AnalysisTask::Pending);
            }
            Ok(AnalysisTask::Completed {
                analysis_id: "ANALYSIS-1".to_string(),
            })
        }

        async fn gate_verdict(
            &self,
            _host: &str,
            _token: &Secret,
            analysis_id: &str,
        ) -> ClientResult<GateVerdict> {
            assert_eq!(analysis_id, "ANALYSIS-1");
            let conditions = if self.status.passes() {
                Vec::new()
            } else {
                vec![GateCondition {
                    metric: "new_coverage".to_string(),
                    status: GateStatus::Error,
                    comparator: "LT".to_string(),
                    threshold: "80".to_string(),
                    actual: "62.5".to_string(),
                }]
            };
            Ok(GateVerdict {
                status: self.status,
                conditions,
            })
        }
    }

    fn writes_report_task(invocation: &ToolInvocation) -> ScriptedResponse {
        let dir = invocation.working_dir.join("target/sonar");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("report-task.txt"), "projectKey=acme\nceTaskId=TASK-1\n").unwrap();
        ScriptedResponse::exit(0)
    }

    fn setup() -> (TempDir, StageContext, Arc<ScriptedRunner>) {
        let dir = TempDir::new().unwrap();
        let context = StageContext::new("quality-gate", dir.path().to_path_buf()).with_secrets(
            ScopedSecrets::new()
                .with("SONAR_HOST_URL", Secret::new("https://sonar.example.com"))
                .with("SONAR_TOKEN", Secret::new("sq-token")),
        );
        let runner = Arc::new(
            ScriptedRunner::new().respond_with("mvn -B sonar:sonar", writes_report_task),
        );
        (dir, context, runner)
    }

    fn stage(runner: Arc<ScriptedRunner>, gate: Arc<FakeGate>) -> QualityGateStage {
        QualityGateStage::new(QualityGateSettings::default(), runner, gate)
            .with_polling(Duration::from_millis(1), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_gate_passes_after_polling() {
        let (_dir, context, runner) = setup();
        let output = stage(runner.clone(), FakeGate::new(2, GateStatus::Ok))
            .execute(&context)
            .await
            .unwrap();

        assert_eq!(
            output.artifacts,
            vec![Artifact::QualityGate {
                analysis_id: "ANALYSIS-1".to_string(),
                status: "OK".to_string(),
            }]
        );
        assert_eq!(
            runner.command_lines(),
            vec!["mvn -B verify".to_string(), "mvn -B sonar:sonar".to_string()]
        );
        let analysis = &runner.calls()[1];
        assert_eq!(
            analysis.secret_env.get("SONAR_TOKEN").map(Secret::expose),
            Some("sq-token")
        );
    }

    #[tokio::test]
    async fn test_warn_passes() {
        let (_dir, context, runner) = setup();
        let output = stage(runner, FakeGate::new(0, GateStatus::Warn))
            .execute(&context)
            .await;
        assert!(output.is_ok());
    }

    #[tokio::test]
    async fn test_gate_rejection_lists_conditions() {
        let (_dir, context, runner) = setup();
        let failure = stage(runner, FakeGate::new(0, GateStatus::Error))
            .execute(&context)
            .await
            .unwrap_err();

        assert_eq!(
            failure.error,
            StageError::QualityGateRejected("new_coverage 62.5 < 80".to_string())
        );
        assert_eq!(failure.artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_gate_without_verdict_fails() {
        let (_dir, context, runner) = setup();
        let failure = stage(runner, FakeGate::new(0, GateStatus::None))
            .execute(&context)
            .await
            .unwrap_err();
        assert_eq!(
            failure.error,
            StageError::QualityGateRejected("gate status NONE".to_string())
        );
    }

    #[tokio::test]
    async fn test_analysis_timeout() {
        let (_dir, context, runner) = setup();
        let failure = QualityGateStage::new(
            QualityGateSettings::default(),
            runner,
            FakeGate::new(usize::MAX, GateStatus::Ok),
        )
        .with_polling(Duration::from_millis(5), Duration::from_millis(50))
        .execute(&context)
        .await
        .unwrap_err();

        assert!(matches!(failure.error, StageError::QualityGateTimeout(_)));
    }

    struct RefusingGate(u16);

    #[async_trait]
    impl QualityGateService for RefusingGate {
        async fn task_status(
            &self,
            _host: &str,
            _token: &Secret,
            _task_id: &str,
        ) -> ClientResult<AnalysisTask> {
            Err(QualityGateClientError::api_error(self.0, "denied"))
        }

        async fn gate_verdict(
            &self,
            _host: &str,
            _token: &Secret,
            _analysis_id: &str,
        ) -> ClientResult<GateVerdict> {
            unreachable!("no analysis completes")
        }
    }

    #[tokio::test]
    async fn test_refused_token_rejects_gate() {
        let (_dir, context, runner) = setup();
        let failure = QualityGateStage::new(
            QualityGateSettings::default(),
            runner,
            Arc::new(RefusingGate(401)),
        )
        .execute(&context)
        .await
        .unwrap_err();

        assert_eq!(
            failure.error,
            StageError::QualityGateRejected(
                "analysis server refused the token: \
                 Analysis server returned status 401: denied"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_server_failure_is_execution_error() {
        let (_dir, context, runner) = setup();
        let failure = QualityGateStage::new(
            QualityGateSettings::default(),
            runner,
            Arc::new(RefusingGate(503)),
        )
        .execute(&context)
        .await
        .unwrap_err();

        assert!(matches!(failure.error, StageError::Execution(_)));
    }

    #[tokio::test]
    async fn test_missing_token_is_reported() {
        let dir = TempDir::new().unwrap();
        let context = StageContext::new("quality-gate", dir.path().to_path_buf());
        let runner = Arc::new(ScriptedRunner::new());
        let failure = stage(runner.clone(), FakeGate::new(0, GateStatus::Ok))
            .execute(&context)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, StageError::MissingSecret(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_report_task() {
        let dir = TempDir::new().unwrap();
        let context = StageContext::new("quality-gate", dir.path().to_path_buf()).with_secrets(
            ScopedSecrets::new()
                .with("SONAR_HOST_URL", Secret::new("https://sonar.example.com"))
                .with("SONAR_TOKEN", Secret::new("sq-token")),
        );
        let failure = stage(Arc::new(ScriptedRunner::new()), FakeGate::new(0, GateStatus::Ok))
            .execute(&context)
            .await
            .unwrap_err();
        assert!(matches!(failure.error, StageError::Execution(_)));
    }
}
