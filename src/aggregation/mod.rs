//! Fan-out aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! parent id (route parameter)
//!     → source.rs (ChildSource: parent → ordered child ids)
//!     → fan_out.rs (one concurrent lookup per child id)
//!     → ordered children, or one AggregationError
//! ```
//!
//! # Design Decisions
//! - All-or-nothing: a single failed child voids the whole result
//! - Results follow input order, never completion order
//! - In-flight siblings are not cancelled when one fails
//! - Child lookups are not breaker-gated

pub mod fan_out;
pub mod source;

pub use fan_out::{AggregationError, AggregationRequest, FanOutAggregator};
pub use source::{ChildSource, EntityId};
