//! Error types for the quality-gate client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QualityGateClientError>;

#[derive(Debug, Error)]
pub enum QualityGateClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(reqwest::Error),

    #[error("Analysis server returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

// The request URL carries the server address, which is a secret.
impl From<reqwest::Error> for QualityGateClientError {
    fn from(error: reqwest::Error) -> Self {
        Self::RequestFailed(error.without_url())
    }
}

impl QualityGateClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Whether the server refused the credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::ApiError { status: 401 | 403, .. })
    }
}
