//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::EntityId;

/// Domain errors represent malformed hierarchies.
///
/// A missing root or a suppressed node is not an error: both yield no tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("cycle detected in hierarchy at entity: {0}")]
    CycleDetected(EntityId),

    #[error("duplicate entity id: {0}")]
    DuplicateId(EntityId),

    #[error("hierarchy deeper than {limit} levels at entity: {id}")]
    DepthExceeded { id: EntityId, limit: usize },
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, DomainError>;
