//! Users and their events, as served by the upstream.

use serde::Deserialize;
use serde_json::Value;

use crate::aggregation::{ChildSource, EntityId};
use crate::upstream::client::UpstreamClient;
use crate::upstream::error::UpstreamError;

/// The part of a user record the gateway cares about.
#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(default)]
    events: Option<Vec<EntityId>>,
}

/// Resolves users to the events they reference.
#[derive(Clone)]
pub struct EventDirectory {
    client: UpstreamClient,
}

impl EventDirectory {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

impl ChildSource for EventDirectory {
    type Child = Value;

    /// A 404 or a `null` body means the user does not exist. A user without
    /// an `events` list has no children.
    async fn child_ids(&self, user_id: &EntityId) -> Result<Option<Vec<EntityId>>, UpstreamError> {
        match self
            .client
            .get_json::<Option<UserRecord>>(&["getUserById", user_id.as_str()])
            .await
        {
            Ok(Some(user)) => Ok(Some(user.events.unwrap_or_default())),
            Ok(None) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn child(&self, event_id: &EntityId) -> Result<Value, UpstreamError> {
        self.client
            .get_json(&["getEventById", event_id.as_str()])
            .await
    }
}
