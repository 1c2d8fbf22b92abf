//! Run state machine.
//!
//! These functions are the only way the engine changes a [`PipelineRun`].
//! Each transition is checked and emits the matching [`Event`]. Results
//! are append-only, and a terminal run accepts no further changes.

use chrono::Utc;
use sl_protocol::{Event, PipelineRun, RunStatus, StageResult, Trigger};
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunStateError {
    #[error("Run is already {0:?}")]
    AlreadyTerminal(RunStatus),

    #[error("Stage '{0}' already has a result")]
    StageAlreadyRecorded(String),

    #[error("Stage '{started}' is still executing, cannot begin '{requested}'")]
    StageInProgress { started: String, requested: String },

    #[error("Result for '{0}' does not belong to the executing stage")]
    UnexpectedResult(String),

    #[error("Run has failed stages and cannot succeed")]
    HasFailures,
}

fn ensure_open(run: &PipelineRun) -> Result<(), RunStateError> {
    if run.status.is_terminal() {
        Err(RunStateError::AlreadyTerminal(run.status))
    } else {
        Ok(())
    }
}

/// Create a new run with Pending status.
pub fn create_run(pipeline_name: impl Into<String>, trigger: Trigger) -> PipelineRun {
    PipelineRun {
        id: Uuid::new_v4(),
        pipeline_name: pipeline_name.into(),
        trigger,
        status: RunStatus::Pending,
        current_stage: None,
        results: Vec::new(),
        logs: Vec::new(),
        started_at: Utc::now(),
        finished_at: None,
    }
}

/// Mark `stage` as executing and emit events.
pub async fn begin_stage(
    run: &mut PipelineRun,
    events_tx: &Sender<Event>,
    stage: &str,
) -> Result<(), RunStateError> {
    ensure_open(run)?;
    if let Some(started) = &run.current_stage {
        return Err(RunStateError::StageInProgress {
            started: started.clone(),
            requested: stage.to_string(),
        });
    }
    if run.result(stage).is_some() {
        return Err(RunStateError::StageAlreadyRecorded(stage.to_string()));
    }

    run.status = RunStatus::Running;
    run.current_stage = Some(stage.to_string());
    let _ = events_tx
        .send(Event::RunStatusUpdate {
            run_id: run.id,
            status: run.status,
            stage: run.current_stage.clone(),
        })
        .await;
    let _ = events_tx
        .send(Event::StageStarted {
            run_id: run.id,
            stage: stage.to_string(),
        })
        .await;
    Ok(())
}

/// Append the result of the executing stage and emit event.
pub async fn record_stage_result(
    run: &mut PipelineRun,
    events_tx: &Sender<Event>,
    result: StageResult,
) -> Result<(), RunStateError> {
    ensure_open(run)?;
    if run.current_stage.as_deref() != Some(result.stage.as_str()) {
        return Err(RunStateError::UnexpectedResult(result.stage));
    }

    run.current_stage = None;
    run.results.push(result.clone());
    let _ = events_tx
        .send(Event::StageFinished {
            run_id: run.id,
            result,
        })
        .await;
    Ok(())
}

/// Mark the run as succeeded and emit events.
pub async fn complete_run(
    run: &mut PipelineRun,
    events_tx: &Sender<Event>,
) -> Result<(), RunStateError> {
    ensure_open(run)?;
    if run.failed_stage().is_some() {
        return Err(RunStateError::HasFailures);
    }

    run.status = RunStatus::Succeeded;
    run.current_stage = None;
    run.finished_at = Some(Utc::now());
    let _ = events_tx
        .send(Event::RunStatusUpdate {
            run_id: run.id,
            status: run.status,
            stage: None,
        })
        .await;
    let _ = events_tx.send(Event::RunSucceeded { run_id: run.id }).await;
    Ok(())
}

/// Mark the run as failed at `stage` and emit events.
pub async fn fail_run(
    run: &mut PipelineRun,
    events_tx: &Sender<Event>,
    stage: &str,
    error: impl Into<String>,
) -> Result<(), RunStateError> {
    ensure_open(run)?;

    run.status = RunStatus::Failed;
    run.current_stage = None;
    run.finished_at = Some(Utc::now());
    let _ = events_tx
        .send(Event::RunStatusUpdate {
            run_id: run.id,
            status: run.status,
            stage: Some(stage.to_string()),
        })
        .await;
    let _ = events_tx
        .send(Event::RunFailed {
            run_id: run.id,
            stage: stage.to_string(),
            error: error.into(),
        })
        .await;
    Ok(())
}

/// Add a line of output from `stage` to the run and emit event.
pub async fn log_to_run(
    run: &mut PipelineRun,
    events_tx: &Sender<Event>,
    stage: &str,
    content: String,
) {
    run.logs.push(format!("[{stage}] {content}"));
    let _ = events_tx
        .send(Event::StageLogChunk {
            run_id: run.id,
            stage: stage.to_string(),
            content,
        })
        .await;
}
