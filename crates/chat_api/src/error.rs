use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid header {key}: {reason}")]
    InvalidHeader { key: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection failure, reset, or a body read that ended abnormally.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-success status; `body` holds at most the first 8 KiB of the response.
    #[error("API error: {status} - {body}")]
    Status { status: StatusCode, body: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,

    #[error("{0}")]
    Runtime(String),
}

impl ChatApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Decode a capped error body for display.
pub(crate) fn error_body_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
