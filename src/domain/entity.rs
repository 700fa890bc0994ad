//! Domain entities: core data structures

use serde::{Deserialize, Serialize};

/// Identifier of an entity within a builder.
pub type EntityId = i64;

/// Internal record derived from one caller-supplied item.
///
/// `parent_id` of `None` marks an entity without a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity<T> {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    pub payload: T,
}

impl<T> Entity<T> {
    pub fn new(id: EntityId, parent_id: Option<EntityId>, payload: T) -> Self {
        Self {
            id,
            parent_id,
            payload,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
