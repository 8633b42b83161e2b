//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the HTTP server, which builds the breaker and aggregator
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breaker settings are fixed at construction
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CircuitBreakerConfig, FanOutConfig, GatewayConfig, ListenerConfig,
    ObservabilityConfig, TimeoutConfig, UpstreamConfig,
};
