//! Concurrent child resolution with all-or-nothing results.

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use thiserror::Error;

use crate::aggregation::source::{ChildSource, EntityId};
use crate::config::FanOutConfig;
use crate::observability::metrics;
use crate::upstream::UpstreamError;

/// One composite lookup: a parent and its ordered child ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    pub parent_id: EntityId,
    pub child_ids: Vec<EntityId>,
}

/// Why a composite lookup produced no result.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// The parent could not be loaded (a missing parent is not an error).
    #[error("failed to load parent {parent_id}: {source}")]
    Parent {
        parent_id: EntityId,
        #[source]
        source: UpstreamError,
    },

    /// At least one child lookup failed. `child_id` is the first failure in
    /// input order.
    #[error("{failed} of {total} children of {parent_id} failed, first was {child_id}: {source}")]
    Child {
        parent_id: EntityId,
        child_id: EntityId,
        failed: usize,
        total: usize,
        #[source]
        source: UpstreamError,
    },
}

/// Resolves a parent's child ids into materialized children.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutAggregator {
    max_concurrency: Option<usize>,
}

impl FanOutAggregator {
    pub fn new(config: FanOutConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
        }
    }

    /// Start every child lookup at once.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Keep at most `limit` child lookups in flight.
    pub fn with_max_concurrency(limit: usize) -> Self {
        Self {
            max_concurrency: Some(limit.max(1)),
        }
    }

    /// Look up `parent_id` and resolve all of its children.
    ///
    /// A parent that does not exist, or has no children, yields an empty list
    /// without any child lookups.
    pub async fn resolve_children<S: ChildSource>(
        &self,
        source: &S,
        parent_id: &EntityId,
    ) -> Result<Vec<S::Child>, AggregationError> {
        let child_ids = match source.child_ids(parent_id).await {
            Ok(Some(ids)) => ids,
            Ok(None) => {
                tracing::debug!(parent_id = %parent_id, "Parent not found, nothing to aggregate");
                return Ok(Vec::new());
            }
            Err(error) => {
                tracing::warn!(parent_id = %parent_id, error = %error, "Parent lookup failed");
                metrics::record_fan_out_failure("parent");
                return Err(AggregationError::Parent {
                    parent_id: parent_id.clone(),
                    source: error,
                });
            }
        };

        self.aggregate(
            source,
            AggregationRequest {
                parent_id: parent_id.clone(),
                child_ids,
            },
        )
        .await
    }

    /// Fetch every child in `request` concurrently.
    ///
    /// Waits for all lookups, even after one has failed, then returns either
    /// the children in `child_ids` order or the first failure.
    pub async fn aggregate<S: ChildSource>(
        &self,
        source: &S,
        request: AggregationRequest,
    ) -> Result<Vec<S::Child>, AggregationError> {
        let AggregationRequest {
            parent_id,
            child_ids,
        } = request;
        if child_ids.is_empty() {
            return Ok(Vec::new());
        }

        let total = child_ids.len();
        metrics::record_fan_out(total);
        tracing::debug!(
            parent_id = %parent_id,
            children = total,
            max_concurrency = ?self.max_concurrency,
            "Fanning out child lookups"
        );

        let lookups: Vec<_> = child_ids.iter().map(|id| source.child(id)).collect();
        let outcomes = match self.max_concurrency {
            Some(limit) if limit < total => {
                stream::iter(lookups)
                    .buffered(limit.max(1))
                    .collect::<Vec<_>>()
                    .await
            }
            _ => join_all(lookups).await,
        };

        let mut children = Vec::with_capacity(total);
        let mut first_failure = None;
        let mut failed = 0;
        for (child_id, outcome) in child_ids.iter().zip(outcomes) {
            match outcome {
                Ok(child) => children.push(child),
                Err(error) => {
                    failed += 1;
                    tracing::warn!(
                        parent_id = %parent_id,
                        child_id = %child_id,
                        error = %error,
                        "Child lookup failed"
                    );
                    if first_failure.is_none() {
                        first_failure = Some((child_id.clone(), error));
                    }
                }
            }
        }

        if let Some((child_id, error)) = first_failure {
            metrics::record_fan_out_failure("child");
            return Err(AggregationError::Child {
                parent_id,
                child_id,
                failed,
                total,
                source: error,
            });
        }
        Ok(children)
    }
}
