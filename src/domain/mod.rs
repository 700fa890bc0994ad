//! Domain layer: entities and tree reconstruction
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod builder;
pub mod entity;
pub mod error;

pub use builder::{BuildOptions, DuplicatePolicy, TreeBuilder};
pub use entity::{Entity, EntityId};
pub use error::{DomainError, TreeResult};
