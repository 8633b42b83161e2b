//! End-to-end tests: the real gateway against an axum mock upstream.

use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;

use common::{gateway_config, start_gateway, start_mock_upstream, ADMIN_KEY};

/// Upstream whose `/addEvent` always fails, counting the calls it receives.
fn failing_add_event(calls: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/addEvent",
        post(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::INTERNAL_SERVER_ERROR, "event store down")
            }
        }),
    )
}

/// Upstream with one user referencing events 1, 2 and 3. Lower ids answer
/// slower, so completion order is the reverse of input order.
fn user_with_events() -> Router {
    Router::new()
        .route(
            "/getUserById/{id}",
            get(|Path(id): Path<String>| async move {
                match id.as_str() {
                    "7" => Ok(Json(json!({"id": 7, "events": [1, 2, 3]}))),
                    "8" => Ok(Json(json!({"id": 8, "events": [1, 99]}))),
                    "9" => Ok(Json(json!({"id": 9}))),
                    _ => Err(StatusCode::NOT_FOUND),
                }
            }),
        )
        .route(
            "/getEventById/{id}",
            get(|Path(id): Path<u64>| async move {
                if id > 3 {
                    return Err(StatusCode::NOT_FOUND);
                }
                tokio::time::sleep(Duration::from_millis((4 - id) * 40)).await;
                Ok(Json(json!({"id": id, "name": format!("event-{id}")})))
            }),
        )
}

#[tokio::test]
async fn test_breaker_trips_then_sheds_without_calling_upstream() {
    let calls = Arc::new(AtomicUsize::new(0));
    let upstream = start_mock_upstream(failing_add_event(calls.clone())).await;

    let mut config = gateway_config(upstream);
    config.breaker.failure_threshold = 2;
    config.breaker.open_timeout_ms = 60_000;
    let gateway = start_gateway(config).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let res = client
            .post(gateway.url("/addEvent"))
            .json(&json!({"name": "standup"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_GATEWAY);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Failed to add event");
    }

    let res = client
        .post(gateway.url("/addEvent"))
        .json(&json!({"name": "standup"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let retry_after: u64 = res.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 60);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Service temporarily unavailable");
    assert!(body["message"].is_string());
    assert_eq!(calls.load(Ordering::SeqCst), 2, "open breaker must not reach upstream");
}

#[tokio::test]
async fn test_health_reports_degraded_while_open() {
    let calls = Arc::new(AtomicUsize::new(0));
    let upstream = start_mock_upstream(failing_add_event(calls)).await;

    let mut config = gateway_config(upstream);
    config.breaker.failure_threshold = 1;
    let gateway = start_gateway(config).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(gateway.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    client
        .post(gateway.url("/addEvent"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    let health: Value = client
        .get(gateway.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["breakers"][0]["name"], "add_event");
    assert_eq!(health["breakers"][0]["state"], "OPEN");
}

#[tokio::test]
async fn test_add_event_stamps_id() {
    let upstream = start_mock_upstream(Router::new().route(
        "/addEvent",
        post(|Json(event): Json<Value>| async move { (StatusCode::CREATED, Json(event)) }),
    ))
    .await;
    let gateway = start_gateway(gateway_config(upstream)).await;
    let client = reqwest::Client::new();

    let created: Value = client
        .post(gateway.url("/addEvent"))
        .json(&json!({"name": "retro", "userId": 7}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(created["id"].as_u64().unwrap() > 0);
    assert_eq!(created["name"], "retro");
    assert_eq!(created["userId"], 7);

    let created: Value = client
        .post(gateway.url("/addEvent"))
        .json(&json!({"id": 42, "name": "retro"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["id"], 42, "client-supplied id wins");
}

#[tokio::test]
async fn test_add_event_rejects_non_object_without_calling_upstream() {
    let calls = Arc::new(AtomicUsize::new(0));
    let upstream = start_mock_upstream(failing_add_event(calls.clone())).await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = reqwest::Client::new()
        .post(gateway.url("/addEvent"))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .unwrap();

    assert!(res.status().is_client_error());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_events_by_user_keeps_input_order() {
    let upstream = start_mock_upstream(user_with_events()).await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = reqwest::get(gateway.url("/getEventsByUserId/7")).await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let events: Vec<Value> = res.json().await.unwrap();
    let ids: Vec<u64> = events.iter().map(|e| e["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(events[0]["name"], "event-1");
}

#[tokio::test]
async fn test_events_by_user_fails_whole_on_missing_event() {
    let upstream = start_mock_upstream(user_with_events()).await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let res = reqwest::get(gateway.url("/getEventsByUserId/8")).await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_GATEWAY);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Failed to fetch user events");
}

#[tokio::test]
async fn test_events_by_user_empty_for_unknown_or_eventless_user() {
    let upstream = start_mock_upstream(user_with_events()).await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    for user in ["404", "9"] {
        let res = reqwest::get(gateway.url(&format!("/getEventsByUserId/{user}")))
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);

        let events: Vec<Value> = res.json().await.unwrap();
        assert!(events.is_empty(), "user {user} should have no events");
    }
}

#[tokio::test]
async fn test_events_by_user_with_concurrency_cap() {
    let upstream = start_mock_upstream(user_with_events()).await;
    let mut config = gateway_config(upstream);
    config.fan_out.max_concurrency = Some(1);
    let gateway = start_gateway(config).await;

    let events: Vec<Value> = reqwest::get(gateway.url("/getEventsByUserId/7"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let ids: Vec<u64> = events.iter().map(|e| e["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_pass_through_routes() {
    let upstream = start_mock_upstream(
        Router::new()
            .route("/getUsers", get(|| async { Json(json!([{"id": 1, "name": "Ada"}])) }))
            .route(
                "/getEvents",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            ),
    )
    .await;
    let gateway = start_gateway(gateway_config(upstream)).await;

    let users: Value = reqwest::get(gateway.url("/getUsers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users, json!([{"id": 1, "name": "Ada"}]));

    let res = reqwest::get(gateway.url("/getEvents")).await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Failed to fetch events");
}

#[tokio::test]
async fn test_request_id_is_generated_or_propagated() {
    let upstream = start_mock_upstream(Router::new()).await;
    let gateway = start_gateway(gateway_config(upstream)).await;
    let client = reqwest::Client::new();

    let res = client.get(gateway.url("/health")).send().await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36, "expected a UUID, got {generated}");

    let res = client
        .get(gateway.url("/health"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_admin_requires_bearer_token() {
    let upstream = start_mock_upstream(Router::new()).await;
    let gateway = start_gateway(gateway_config(upstream)).await;
    let client = reqwest::Client::new();

    let res = client
        .get(gateway.admin_url("/admin/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);

    let res = client
        .get(gateway.admin_url("/admin/breakers"))
        .bearer_auth("wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);

    let status: Value = client
        .get(gateway.admin_url("/admin/status"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["version"], env!("CARGO_PKG_VERSION"));

    let breakers: Value = client
        .get(gateway.admin_url("/admin/breakers"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(breakers[0]["state"], "CLOSED");
    assert_eq!(breakers[0]["recent_failures"], 0);
}
