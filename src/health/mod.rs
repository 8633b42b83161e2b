//! Gateway health endpoint.
//!
//! Reports `degraded` while any breaker is not closed. The gateway itself is
//! still serving, so the status code stays 200.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::{BreakerSnapshot, BreakerState};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub breakers: Vec<BreakerSnapshot>,
}

impl HealthReport {
    pub fn from_breakers(breakers: Vec<BreakerSnapshot>) -> Self {
        let degraded = breakers.iter().any(|b| b.state != BreakerState::Closed);
        Self {
            status: if degraded { "degraded" } else { "ok" },
            breakers,
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport::from_breakers(state.breakers()))
}
