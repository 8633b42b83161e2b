//! Event gateway library: a JSON HTTP front for a single event service, with
//! a circuit breaker on mutations and fan-out aggregation of user events.

// Core subsystems
pub mod config;
pub mod http;
pub mod upstream;

// Gateway features
pub mod aggregation;
pub mod resilience;

// Operations
pub mod admin;
pub mod health;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
