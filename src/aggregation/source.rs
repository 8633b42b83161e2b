//! Parent/child lookups the aggregator fans out over.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::future::Future;

use crate::upstream::UpstreamError;

/// Opaque entity identifier.
///
/// Upstream payloads carry ids either as strings or as numbers; both
/// normalize to the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => EntityId(id),
            RawId::Number(id) => EntityId(id.to_string()),
        })
    }
}

/// A dependency that can resolve a parent to its child ids and fetch each child.
pub trait ChildSource: Send + Sync {
    type Child: Send;

    /// Child ids of `parent_id` in their recorded order.
    /// `Ok(None)` means the parent does not exist.
    fn child_ids(
        &self,
        parent_id: &EntityId,
    ) -> impl Future<Output = Result<Option<Vec<EntityId>>, UpstreamError>> + Send;

    /// Fetch one child.
    fn child(
        &self,
        child_id: &EntityId,
    ) -> impl Future<Output = Result<Self::Child, UpstreamError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_accept_strings_and_numbers() {
        let ids: Vec<EntityId> = serde_json::from_str(r#"["e-1", 42, 7]"#).unwrap();
        assert_eq!(ids, vec![EntityId::from("e-1"), EntityId::from("42"), EntityId::from("7")]);
    }

    #[test]
    fn test_ids_reject_other_shapes() {
        assert!(serde_json::from_str::<EntityId>(r#"{"id": 1}"#).is_err());
    }
}
