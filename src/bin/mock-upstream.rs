//! In-memory stand-in for the upstream event service, for local runs.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "mock-upstream")]
#[command(about = "In-memory event service for exercising the gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:3001")]
    bind: String,

    /// Answer every POST /addEvent with 500.
    #[arg(long)]
    fail_add_event: bool,
}

#[derive(Clone)]
struct MockState {
    users: Arc<Vec<Value>>,
    events: Arc<RwLock<Vec<Value>>>,
    fail_add_event: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let state = MockState {
        users: Arc::new(vec![
            json!({"id": 1, "name": "Ada", "events": [1, 2]}),
            json!({"id": 2, "name": "Grace", "events": [3]}),
            json!({"id": 3, "name": "Linus", "events": []}),
        ]),
        events: Arc::new(RwLock::new(vec![
            json!({"id": 1, "name": "Kickoff", "userId": 1}),
            json!({"id": 2, "name": "Design review", "userId": 1}),
            json!({"id": 3, "name": "Launch", "userId": 2}),
        ])),
        fail_add_event: cli.fail_add_event,
    };

    let app = Router::new()
        .route("/getUsers", get(get_users))
        .route("/getUserById/{id}", get(get_user))
        .route("/getEvents", get(get_events))
        .route("/getEventById/{id}", get(get_event))
        .route("/addEvent", post(add_event))
        .with_state(state);

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        fail_add_event = cli.fail_add_event,
        "Mock upstream listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

fn matches_id(item: &Value, id: &str) -> bool {
    match &item["id"] {
        Value::Number(n) => n.to_string() == id,
        Value::String(s) => s == id,
        _ => false,
    }
}

async fn get_users(State(state): State<MockState>) -> Json<Value> {
    Json(Value::Array(state.users.to_vec()))
}

async fn get_user(
    State(state): State<MockState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .users
        .iter()
        .find(|u| matches_id(u, &id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_events(State(state): State<MockState>) -> Json<Value> {
    Json(Value::Array(state.events.read().await.clone()))
}

async fn get_event(
    State(state): State<MockState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .events
        .read()
        .await
        .iter()
        .find(|e| matches_id(e, &id))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn add_event(
    State(state): State<MockState>,
    Json(event): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if state.fail_add_event {
        tracing::warn!("Simulating addEvent outage");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    state.events.write().await.push(event.clone());
    tracing::info!(id = %event["id"], "Event added");
    Ok((StatusCode::CREATED, Json(event)))
}
