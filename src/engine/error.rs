//! Error types for storage operations.
//!
//! The ECS distinguishes two failure classes. Runtime conditions such as a
//! missing component or a dead entity reference surface as `Option`/`bool`
//! sentinels on the public API and never allocate an error. Programmer
//! errors, such as spawning an entity with no components or using an
//! unregistered type, are fatal: the public surface panics with the
//! `Display` rendering of one of the errors below.
//!
//! Internally the fallible seams return [`StorageResult`] so the failure
//! site and the panic site can stay separate and the diagnostics carry
//! structured context.

use thiserror::Error;

use crate::engine::entity::EntityId;

/// Result alias for internal storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure modes of entity spawning and component migration.
///
/// All variants represent programmer errors; the public API converts them
/// into panics at the call boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A spawn was attempted with an empty component set.
    #[error("cannot spawn an entity with no components")]
    EmptySpawn,

    /// The same component type appeared twice in one spawn set.
    #[error("duplicate component type {name} in spawn set")]
    DuplicateComponent {
        /// Type name of the duplicated component.
        name: &'static str,
    },

    /// A component type was used before being registered.
    #[error("component type {name} is not registered")]
    UnregisteredComponent {
        /// Type name of the unregistered component.
        name: &'static str,
    },

    /// An operation required a live entity but the id did not resolve.
    #[error("entity {id:?} does not exist")]
    MissingEntity {
        /// The identifier that failed to resolve.
        id: EntityId,
    },
}
