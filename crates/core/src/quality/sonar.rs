//! SonarQube web API client.

use super::error::{QualityGateClientError, Result};
use super::{AnalysisTask, GateCondition, GateStatus, GateVerdict, QualityGateService};
use crate::secrets::Secret;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TaskResponse {
    task: Task,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Task {
    status: String,
    #[serde(default)]
    analysis_id: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatusResponse {
    project_status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
struct ProjectStatus {
    status: String,
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Condition {
    status: String,
    metric_key: String,
    #[serde(default)]
    comparator: String,
    #[serde(default)]
    error_threshold: String,
    #[serde(default)]
    actual_value: String,
}

impl TryFrom<Task> for AnalysisTask {
    type Error = QualityGateClientError;

    fn try_from(task: Task) -> Result<Self> {
        match task.status.as_str() {
            "PENDING" | "IN_PROGRESS" => Ok(Self::Pending),
            "SUCCESS" => task
                .analysis_id
                .map(|analysis_id| Self::Completed { analysis_id })
                .ok_or_else(|| {
                    QualityGateClientError::ParseError(
                        "successful task without analysisId".to_string(),
                    )
                }),
            "FAILED" | "CANCELED" => Ok(Self::Aborted {
                reason: task
                    .error_message
                    .unwrap_or_else(|| format!("analysis task {}", task.status)),
            }),
            other => Err(QualityGateClientError::ParseError(format!(
                "unknown task status '{other}'"
            ))),
        }
    }
}

impl From<ProjectStatus> for GateVerdict {
    fn from(status: ProjectStatus) -> Self {
        Self {
            status: GateStatus::from_label(&status.status),
            conditions: status
                .conditions
                .into_iter()
                .map(|c| GateCondition {
                    metric: c.metric_key,
                    status: GateStatus::from_label(&c.status),
                    comparator: c.comparator,
                    threshold: c.error_threshold,
                    actual: c.actual_value,
                })
                .collect(),
        }
    }
}

/// Talks to `/api/ce/task` and `/api/qualitygates/project_status`.
///
/// The token is sent as the basic-auth user name with an empty password,
/// which is how SonarQube accepts user tokens.
#[derive(Debug, Clone, Default)]
pub struct SonarQubeService {
    client: Client,
}

impl SonarQubeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        host: &str,
        path: &str,
        query: &[(&str, &str)],
        token: &Secret,
    ) -> Result<T> {
        let url = format!("{}{path}", host.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(query)
            .basic_auth(token.expose(), Some(""))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QualityGateClientError::api_error(status.as_u16(), message));
        }

        response
            .json()
            .await
            .map_err(|e| QualityGateClientError::ParseError(e.without_url().to_string()))
    }
}

#[async_trait]
impl QualityGateService for SonarQubeService {
    async fn task_status(&self, host: &str, token: &Secret, task_id: &str) -> Result<AnalysisTask> {
        let response: TaskResponse = self
            .get(host, "/api/ce/task", &[("id", task_id)], token)
            .await?;
        response.task.try_into()
    }

    async fn gate_verdict(
        &self,
        host: &str,
        token: &Secret,
        analysis_id: &str,
    ) -> Result<GateVerdict> {
        let response: ProjectStatusResponse = self
            .get(
                host,
                "/api/qualitygates/project_status",
                &[("analysisId", analysis_id)],
                token,
            )
            .await?;
        Ok(response.project_status.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one HTTP request with `status` and `body`; the handle yields
    /// the raw request head.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_lowercase()
        });
        (host, handle)
    }

    #[tokio::test]
    async fn test_task_status_request() {
        let (host, request) =
            serve_once("200 OK", r#"{"task":{"id":"AX1","status":"SUCCESS","analysisId":"A1"}}"#)
                .await;

        let task = SonarQubeService::new()
            .task_status(&format!("{host}/"), &Secret::new("sq-token"), "AX1")
            .await
            .unwrap();

        assert_eq!(
            task,
            AnalysisTask::Completed {
                analysis_id: "A1".to_string()
            }
        );
        let request = request.await.unwrap();
        assert!(request.starts_with("get /api/ce/task?id=ax1 http/1.1"));
        // "sq-token:" as the user name with an empty password.
        assert!(request.contains("authorization: basic c3etdg9rzw46"));
    }

    #[tokio::test]
    async fn test_rejected_token_is_auth_error() {
        let (host, request) = serve_once("403 Forbidden", r#"{"errors":[]}"#).await;

        let error = SonarQubeService::new()
            .gate_verdict(&host, &Secret::new("stale"), "A1")
            .await
            .unwrap_err();

        assert!(matches!(error, QualityGateClientError::ApiError { status: 403, .. }));
        assert!(error.is_auth_error());
        assert!(request
            .await
            .unwrap()
            .starts_with("get /api/qualitygates/project_status?analysisid=a1 "));
    }

    #[tokio::test]
    async fn test_server_error_is_not_auth_error() {
        let (host, _request) = serve_once("500 Internal Server Error", "boom").await;

        let error = SonarQubeService::new()
            .task_status(&host, &Secret::new("sq-token"), "AX1")
            .await
            .unwrap_err();

        assert!(matches!(
            &error,
            QualityGateClientError::ApiError { status: 500, message } if message == "boom"
        ));
        assert!(!error.is_auth_error());
    }

    #[tokio::test]
    async fn test_request_errors_omit_server_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = SonarQubeService::new()
            .task_status(
                &format!("http://{addr}/private-sonar"),
                &Secret::new("sq-token"),
                "AX1",
            )
            .await
            .unwrap_err();

        assert!(matches!(error, QualityGateClientError::RequestFailed(_)));
        assert!(!error.to_string().contains("private-sonar"));
    }

    fn task(json: &str) -> Result<AnalysisTask> {
        let response: TaskResponse = serde_json::from_str(json).unwrap();
        response.task.try_into()
    }

    #[test]
    fn test_task_states() {
        assert_eq!(
            task(r#"{"task":{"id":"t1","status":"IN_PROGRESS"}}"#).unwrap(),
            AnalysisTask::Pending
        );
        assert_eq!(
            task(r#"{"task":{"id":"t1","status":"SUCCESS","analysisId":"A1"}}"#).unwrap(),
            AnalysisTask::Completed {
                analysis_id: "A1".to_string()
            }
        );
        assert_eq!(
            task(r#"{"task":{"id":"t1","status":"FAILED","errorMessage":"boom"}}"#).unwrap(),
            AnalysisTask::Aborted {
                reason: "boom".to_string()
            }
        );
        assert!(task(r#"{"task":{"id":"t1","status":"SUCCESS"}}"#).is_err());
        assert!(task(r#"{"task":{"id":"t1","status":"WEIRD"}}"#).is_err());
    }

    #[test]
    fn test_project_status_conversion() {
        let json = r#"{
            "projectStatus": {
                "status": "ERROR",
                "conditions": [
                    {"status": "ERROR", "metricKey": "new_coverage", "comparator": "LT",
                     "errorThreshold": "80", "actualValue": "62.5"},
                    {"status": "OK", "metricKey": "new_bugs", "comparator": "GT",
                     "errorThreshold": "0", "actualValue": "0"}
                ]
            }
        }"#;
        let response: ProjectStatusResponse = serde_json::from_str(json).unwrap();
        let verdict: GateVerdict = response.project_status.into();

        assert_eq!(verdict.status, GateStatus::Error);
        let failed: Vec<String> = verdict.failed_conditions().map(ToString::to_string).collect();
        assert_eq!(failed, vec!["new_coverage 62.5 < 80".to_string()]);
    }

    #[test]
    fn test_project_without_gate() {
        let response: ProjectStatusResponse =
            serde_json::from_str(r#"{"projectStatus":{"status":"NONE"}}"#).unwrap();
        let verdict: GateVerdict = response.project_status.into();
        assert_eq!(verdict.status, GateStatus::None);
        assert!(verdict.conditions.is_empty());
    }
}
