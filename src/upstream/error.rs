//! Upstream failure taxonomy.

use axum::http::StatusCode;
use thiserror::Error;

/// Longest slice of an error body kept for logs.
const BODY_EXCERPT_CHARS: usize = 256;

/// Any failure of a call to the upstream dependency.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The upstream could not be reached.
    #[error("upstream unreachable: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    /// The response body could not be read or exceeded the size limit.
    #[error("failed to read upstream body: {0}")]
    Body(#[source] axum::Error),

    /// The payload was not the JSON we expected.
    #[error("malformed upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The outbound request could not be built.
    #[error("invalid upstream request: {0}")]
    Request(String),
}

impl UpstreamError {
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body)
            .chars()
            .take(BODY_EXCERPT_CHARS)
            .collect();
        UpstreamError::Status { status, body }
    }

    /// Status code of a non-success response, if that is what failed.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NOT_FOUND)
    }
}
