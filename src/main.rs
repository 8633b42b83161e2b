//! Event gateway (v1)
//!
//! Fronts one upstream event service with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!  Client ──▶ http server ──┬─ /getUsers, /getEvents ─────────────▶ upstream
//!                           ├─ /addEvent ──▶ circuit breaker ─────▶ upstream
//!                           └─ /getEventsByUserId/{id}
//!                                   └──▶ fan-out aggregator ─┬───▶ /getUserById
//!                                                            └───▶ /getEventById × N
//!
//!  Cross-cutting: config, logging, metrics, health, admin API, graceful shutdown
//! ```

use clap::Parser;
use std::path::PathBuf;

use event_gateway::config::{load_config, GatewayConfig};
use event_gateway::lifecycle;
use event_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "event-gateway")]
#[command(about = "HTTP gateway for the event service", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "event-gateway starting"
    );

    lifecycle::start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
