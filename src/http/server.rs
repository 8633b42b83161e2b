//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared application state (upstream client, breaker, aggregator)
//! - Create the Axum router with all gateway routes
//! - Wire up middleware (request ID, tracing, timeout, request metrics)
//! - Serve the gateway and, when enabled, the admin API until shutdown

use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::aggregation::FanOutAggregator;
use crate::config::GatewayConfig;
use crate::health;
use crate::http::handlers;
use crate::http::request::{request_span, MakeRequestUuidV4};
use crate::observability::metrics;
use crate::resilience::{BreakerSnapshot, CircuitBreaker};
use crate::upstream::{EventDirectory, UpstreamClient, UpstreamError};

/// Name of the breaker guarding `POST /addEvent`.
pub const ADD_EVENT_BREAKER: &str = "add_event";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
    pub events: EventDirectory,
    pub add_event_breaker: Arc<CircuitBreaker>,
    pub fan_out: FanOutAggregator,
    pub admin_api_key: Arc<str>,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::new(&config.upstream)?;

        Ok(Self {
            events: EventDirectory::new(upstream.clone()),
            upstream,
            add_event_breaker: Arc::new(CircuitBreaker::new(ADD_EVENT_BREAKER, config.breaker)),
            fan_out: FanOutAggregator::new(config.fan_out),
            admin_api_key: Arc::from(config.admin.api_key.as_str()),
        })
    }

    /// Snapshots of every breaker the gateway holds.
    pub fn breakers(&self) -> Vec<BreakerSnapshot> {
        vec![self.add_event_breaker.snapshot()]
    }
}

/// HTTP server for the event gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, UpstreamError> {
        let state = AppState::new(&config)?;
        let router = Self::build_router(&config, state.clone());

        Ok(Self {
            router,
            state,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/getUsers", get(handlers::get_users))
            .route("/getEvents", get(handlers::get_events))
            .route("/addEvent", post(handlers::add_event))
            .route("/getEventsByUserId/{id}", get(handlers::events_by_user))
            .route("/health", get(health::health))
            .route_layer(middleware::from_fn(track_requests))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http().make_span_with(request_span))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// The admin API is served on `admin_listener` when one is given.
    pub async fn run(
        self,
        listener: TcpListener,
        admin_listener: Option<TcpListener>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.upstream.base_url(),
            "HTTP server starting"
        );

        if let Some(admin_listener) = admin_listener {
            let admin_addr = admin_listener.local_addr()?;
            let admin_router = admin::setup_admin_router(self.state.clone());
            let admin_shutdown = shutdown.resubscribe();

            tokio::spawn(async move {
                tracing::info!(address = %admin_addr, "Admin API listening");
                if let Err(e) = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(wait_for(admin_shutdown))
                    .await
                {
                    tracing::error!(error = %e, "Admin API server failed");
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Record count and latency per matched route.
async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let response = next.run(request).await;
    metrics::record_request(&method, &route, response.status().as_u16(), start);
    response
}

async fn wait_for(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
    tracing::info!("Shutdown signal received");
}
