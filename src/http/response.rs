//! Mapping core outcomes to client responses.
//!
//! # Design Decisions
//! - Breaker rejections are 503 with `Retry-After`: the upstream was not called
//! - Upstream and aggregation failures are 502: the upstream was called and failed
//! - Error bodies are small JSON objects; upstream details stay in the logs

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

const UNAVAILABLE_MESSAGE: &str =
    "External event service is experiencing issues. Please try again later.";

/// A failed gateway call, ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: Option<&'static str>,
    retry_after: Option<Duration>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl ApiError {
    /// The breaker shed the call.
    pub fn breaker_open(retry_after: Duration) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: "Service temporarily unavailable",
            message: Some(UNAVAILABLE_MESSAGE),
            retry_after: Some(retry_after),
        }
    }

    /// The upstream was called and failed.
    pub fn upstream(error: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            error,
            message: None,
            retry_after: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: self.message,
        };
        let mut response = (self.status, Json(body)).into_response();

        if let Some(retry_after) = self.retry_after {
            // Whole seconds, rounded up, never zero.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
