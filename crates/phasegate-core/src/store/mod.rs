//! Persistence collaborators for parent entities.
//!
//! The engine only needs whole-entity load and versioned save keyed by
//! entity id. [`MemoryStore`] keeps entities in process; [`TomlStore`] writes
//! one TOML file per entity through an [`FsAdapter`](fs::FsAdapter).

pub mod fs;
pub mod fs_impl;
pub mod fs_mock;
pub mod memory;
pub mod toml_store;

pub use memory::MemoryStore;
pub use toml_store::TomlStore;

use crate::error::Result;
use crate::state::{EntityId, ParentEntity};

/// Load/save interface for parent entities.
///
/// Loads return a complete snapshot; saves replace the complete entity or
/// nothing. `save` is a compare-and-swap on [`ParentEntity::version`].
pub trait WorkflowStore: Send + Sync {
    /// Loads the entity with `id`.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::EntityNotFound` if no such entity is stored.
    fn load(&self, id: &EntityId) -> Result<ParentEntity>;

    /// Stores a new entity.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::EntityAlreadyExists` if the id is taken.
    fn create(&self, entity: &ParentEntity) -> Result<()>;

    /// Replaces the stored entity if its version still equals `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::ConcurrentModification` when the stored
    /// version differs and `PhasegateError::EntityNotFound` when nothing is
    /// stored under the id.
    fn save(&self, entity: &ParentEntity, expected_version: u64) -> Result<()>;

    /// Ids of all stored entities, sorted.
    fn list(&self) -> Result<Vec<EntityId>>;
}
