//! Pipeline execution engine.
//!
//! The PipelineEngine plans a pipeline, then executes its stages one at a
//! time in dependency order. The first failing stage halts the run; later
//! stages never execute and get no result.

pub mod plan;

pub use plan::{execution_order, PlanError};

use crate::secrets::{self, SecretStore};
use crate::stages::base::{StageError, StageFailure};
use crate::stages::context::{LogSink, StageContext};
use crate::stages::registry::StageRegistry;
use crate::state::run::{
    begin_stage, complete_run, create_run, fail_run, log_to_run, record_stage_result,
    RunStateError,
};
use sl_protocol::{Event, Pipeline, PipelineRun, StageDef, StageResult, Trigger};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

/// Why a run could not be carried out at all.
///
/// A stage failing is not an engine error: the run is returned with status
/// `Failed`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("No adapter registered for stage '{0}'")]
    UnregisteredStage(String),

    #[error(transparent)]
    State(#[from] RunStateError),
}

/// The main pipeline execution engine.
pub struct PipelineEngine {
    registry: StageRegistry,
    secrets: Arc<dyn SecretStore>,
    workspace: PathBuf,
}

impl PipelineEngine {
    /// Create an engine resolving stages from `registry` and secrets from
    /// `secrets`. Tools run in the current directory unless
    /// [`with_workspace`](Self::with_workspace) says otherwise.
    pub fn new(registry: StageRegistry, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            registry,
            secrets,
            workspace: PathBuf::from("."),
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Execute `pipeline` for `trigger` and return the final run.
    ///
    /// Emits `RunStarted`, then per stage `StageStarted`, any
    /// `StageLogChunk`s and `StageFinished`, and finally exactly one of
    /// `RunSucceeded` or `RunFailed`.
    ///
    /// # Errors
    ///
    /// Returns an error without creating a run if the pipeline cannot be
    /// planned or a stage has no registered adapter.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        trigger: Trigger,
        events_tx: Sender<Event>,
    ) -> Result<PipelineRun, EngineError> {
        let order = execution_order(pipeline)?;
        if let Some(missing) = order.iter().find(|def| !self.registry.has_stage(&def.name)) {
            return Err(EngineError::UnregisteredStage(missing.name.clone()));
        }

        let mut run = create_run(pipeline.name.clone(), trigger);
        let _ = events_tx
            .send(Event::RunStarted {
                run_id: run.id,
                pipeline_name: pipeline.name.clone(),
            })
            .await;
        info!(
            run_id = %run.id,
            pipeline = %pipeline.name,
            branch = %run.trigger.branch,
            "run started"
        );

        for def in order {
            if let Some(unmet) = def
                .needs
                .iter()
                .find(|dependency| !run.result(dependency).is_some_and(StageResult::is_success))
            {
                // Never execute a stage whose dependency did not succeed.
                let error = StageError::DependencyNotSatisfied(format!(
                    "'{}' needs '{unmet}'",
                    def.name
                ));
                warn!(run_id = %run.id, stage = %def.name, "{error}");
                fail_run(&mut run, &events_tx, &def.name, error.to_string()).await?;
                return Ok(run);
            }

            begin_stage(&mut run, &events_tx, &def.name).await?;
            info!(run_id = %run.id, stage = %def.name, action = def.action.kind(), "stage started");

            let result = self.execute_stage(&mut run, pipeline, def, &events_tx).await;
            let error = result.error.clone();
            record_stage_result(&mut run, &events_tx, result).await?;

            if let Some(error) = error {
                warn!(run_id = %run.id, stage = %def.name, %error, "stage failed, halting run");
                fail_run(&mut run, &events_tx, &def.name, error).await?;
                return Ok(run);
            }
            info!(run_id = %run.id, stage = %def.name, "stage succeeded");
        }

        complete_run(&mut run, &events_tx).await?;
        info!(run_id = %run.id, pipeline = %pipeline.name, "run succeeded");
        Ok(run)
    }

    /// Execute one stage and turn its outcome into a result.
    ///
    /// Output lines are forwarded into the run as they arrive.
    async fn execute_stage(
        &self,
        run: &mut PipelineRun,
        pipeline: &Pipeline,
        def: &StageDef,
        events_tx: &Sender<Event>,
    ) -> StageResult {
        let Some(stage) = self.registry.get(&def.name) else {
            return failed_result(
                def,
                StageError::NotAvailable(format!("no adapter for '{}'", def.name)).into(),
            );
        };

        if !stage.check_availability().await {
            return failed_result(
                def,
                StageError::NotAvailable(format!(
                    "tools for {} action are not installed",
                    def.action.kind()
                ))
                .into(),
            );
        }

        let scoped = match secrets::scope(self.secrets.as_ref(), &def.secrets) {
            Ok(scoped) => scoped,
            Err(error) => return failed_result(def, error.into()),
        };

        let (sink, mut log_rx) = LogSink::channel();
        let context = StageContext::new(def.name.clone(), self.workspace.clone())
            .with_run(run.id, pipeline.name.clone())
            .with_trigger(run.trigger.clone())
            .with_upstream(run.artifacts().cloned().collect())
            .with_secrets(scoped)
            .with_withheld_env(withheld_secrets(pipeline, def))
            .with_log(sink);

        let execution = stage.execute(&context);
        tokio::pin!(execution);

        let outcome = loop {
            tokio::select! {
                Some(line) = log_rx.recv() => {
                    log_to_run(run, events_tx, &def.name, line).await;
                }
                outcome = &mut execution => break outcome,
            }
        };
        while let Ok(line) = log_rx.try_recv() {
            log_to_run(run, events_tx, &def.name, line).await;
        }

        match outcome {
            Ok(output) => StageResult::success(def.name.clone(), output.artifacts),
            // Error text reaches the record, events and logs like output does.
            Err(failure) => StageResult::failure(
                def.name.clone(),
                context.log_sink().mask(&failure.error.to_string()),
                failure.artifacts,
            ),
        }
    }
}

fn failed_result(def: &StageDef, failure: StageFailure) -> StageResult {
    StageResult::failure(def.name.clone(), failure.error.to_string(), failure.artifacts)
}

/// Secret names other stages declare that `def` does not.
fn withheld_secrets(pipeline: &Pipeline, def: &StageDef) -> Vec<String> {
    let own: BTreeSet<&str> = def.secrets.iter().map(String::as_str).collect();
    pipeline
        .stages
        .iter()
        .flat_map(|stage| stage.secrets.iter())
        .filter(|name| !own.contains(name.as_str()))
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
