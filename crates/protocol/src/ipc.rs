//! Run events.
//!
//! The engine reports progress as a stream of `Event`s sent over a channel.
//! Whoever started the run (the CLI, a webhook receiver) renders them and
//! turns the terminal event into its own success/failure signal.
//!
//! Uses tagged enum serialization:
//! ```json
//! {
//!   "type": "stageFinished",
//!   "payload": {
//!     "run_id": "uuid-here",
//!     "result": { "stage": "build", "status": "SUCCESS", ... }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run_models::{RunStatus, StageResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A new run has been created.
    RunStarted { run_id: Uuid, pipeline_name: String },

    /// The run's status has changed.
    RunStatusUpdate {
        run_id: Uuid,
        status: RunStatus,
        stage: Option<String>,
    },

    /// A stage has started executing.
    StageStarted { run_id: Uuid, stage: String },

    /// A stage produced a line of output. Secret values are already masked.
    StageLogChunk {
        run_id: Uuid,
        stage: String,
        content: String,
    },

    /// A stage result was recorded.
    StageFinished { run_id: Uuid, result: StageResult },

    /// Every stage succeeded.
    RunSucceeded { run_id: Uuid },

    /// A stage failed and the run was halted.
    RunFailed {
        run_id: Uuid,
        stage: String,
        error: String,
    },
}

impl Event {
    /// Whether this event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunSucceeded { .. } | Self::RunFailed { .. })
    }
}
