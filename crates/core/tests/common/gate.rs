//! In-memory analysis server.

use async_trait::async_trait;
use sl_core::quality::{
    AnalysisTask, GateCondition, GateStatus, GateVerdict, QualityGateClientError,
    QualityGateService, Result,
};
use sl_core::secrets::Secret;
use std::sync::{Arc, Mutex};

/// Answers every task as processed and returns a fixed verdict.
pub struct FakeGate {
    status: GateStatus,
    conditions: Vec<GateCondition>,
    unreachable: bool,
    tokens_seen: Mutex<Vec<String>>,
}

impl FakeGate {
    pub fn passing() -> Arc<Self> {
        Arc::new(Self {
            status: GateStatus::Ok,
            conditions: Vec::new(),
            unreachable: false,
            tokens_seen: Mutex::new(Vec::new()),
        })
    }

    /// Rejects with `new_coverage 62.5 < 80`.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            status: GateStatus::Error,
            conditions: vec![GateCondition {
                metric: "new_coverage".to_string(),
                status: GateStatus::Error,
                comparator: "LT".to_string(),
                threshold: "80".to_string(),
                actual: "62.5".to_string(),
            }],
            unreachable: false,
            tokens_seen: Mutex::new(Vec::new()),
        })
    }

    /// Answers every request with a gateway error naming the host.
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            status: GateStatus::Ok,
            conditions: Vec::new(),
            unreachable: true,
            tokens_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen
            .lock()
            .map(|tokens| tokens.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QualityGateService for FakeGate {
    async fn task_status(
        &self,
        host: &str,
        token: &Secret,
        task_id: &str,
    ) -> Result<AnalysisTask> {
        if let Ok(mut tokens) = self.tokens_seen.lock() {
            tokens.push(token.expose().to_string());
        }
        if self.unreachable {
            return Err(QualityGateClientError::api_error(
                502,
                format!("no upstream for {host}/api/ce/task"),
            ));
        }
        Ok(AnalysisTask::Completed {
            analysis_id: format!("analysis-of-{task_id}"),
        })
    }

    async fn gate_verdict(
        &self,
        _host: &str,
        _token: &Secret,
        _analysis_id: &str,
    ) -> Result<GateVerdict> {
        Ok(GateVerdict {
            status: self.status,
            conditions: self.conditions.clone(),
        })
    }
}
