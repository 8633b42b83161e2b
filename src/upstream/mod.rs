//! Upstream event service subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → client.rs (build URL, send over pooled hyper client, decode JSON)
//!     → error.rs (classify: status / transport / body / decode / request)
//!
//! events.rs adapts the client to the aggregator's ChildSource:
//!     user id → /getUserById/{id} → event ids
//!     event id → /getEventById/{id} → event
//! ```
//!
//! # Design Decisions
//! - Every upstream failure is one error type, whatever went wrong
//! - Non-2xx responses keep their status so callers can tell
//!   "service says no" from "service unreachable"
//! - No per-call timeout here; only the connect timeout is bounded

pub mod client;
pub mod error;
pub mod events;

pub use client::UpstreamClient;
pub use error::UpstreamError;
pub use events::EventDirectory;
