//! Gateway routes.
//!
//! Each route is one of three kinds:
//! - pass-through: forwarded as-is, no breaker
//! - breaker-gated: `POST /addEvent`
//! - aggregated: `GET /getEventsByUserId/{id}` fans out over the user's events

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::aggregation::EntityId;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::resilience::BreakerError;

const GET_USERS: &[&str] = &["getUsers"];
const GET_EVENTS: &[&str] = &["getEvents"];
const ADD_EVENT: &[&str] = &["addEvent"];

pub async fn get_users(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    pass_through(&state, GET_USERS, "Failed to fetch users").await
}

pub async fn get_events(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    pass_through(&state, GET_EVENTS, "Failed to fetch events").await
}

async fn pass_through(
    state: &AppState,
    path: &[&str],
    failure: &'static str,
) -> Result<Json<Value>, ApiError> {
    state.upstream.get_json(path).await.map(Json).map_err(|e| {
        tracing::error!(path = ?path, error = %e, "{}", failure);
        ApiError::upstream(failure)
    })
}

/// Forward a new event through the breaker.
pub async fn add_event(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let event = stamp_event(body);

    let result = state
        .add_event_breaker
        .call(|| state.upstream.post_json::<_, Value>(ADD_EVENT, &event))
        .await;

    match result {
        Ok(created) => Ok(Json(created)),
        Err(BreakerError::Open { retry_after }) => {
            tracing::warn!(
                retry_after_ms = retry_after.as_millis() as u64,
                "Circuit breaker is open, event service temporarily unavailable"
            );
            Err(ApiError::breaker_open(retry_after))
        }
        Err(BreakerError::Upstream(e)) => {
            tracing::error!(error = %e, "Failed to add event");
            Err(ApiError::upstream("Failed to add event"))
        }
    }
}

/// Resolve every event a user references, all or nothing.
pub async fn events_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let user_id = EntityId::from(user_id);

    state
        .fan_out
        .resolve_children(&state.events, &user_id)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to fetch user events");
            ApiError::upstream("Failed to fetch user events")
        })
}

/// Give the event an `id` of the current Unix time in milliseconds.
/// Fields sent by the client win over the stamp.
fn stamp_event(body: Map<String, Value>) -> Map<String, Value> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    let mut event = Map::new();
    event.insert("id".to_string(), Value::from(now_ms));
    event.extend(body);
    event
}
