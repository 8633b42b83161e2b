//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Mutation request to the upstream:
//!     → circuit_breaker.rs (admit, reject fast, or admit a single probe)
//!     → operation runs against the upstream
//!     → circuit_breaker.rs (record outcome, trip or close)
//!
//! clock.rs supplies "now" to the breaker.
//! ```
//!
//! # Design Decisions
//! - One breaker per protected call-site, owned by application state
//! - Time is injected so tests never sleep
//! - No retries; the cool-down timer is the only recovery mechanism

pub mod circuit_breaker;
pub mod clock;

pub use circuit_breaker::{BreakerError, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use clock::{Clock, ManualClock, MonotonicClock};
