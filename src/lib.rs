//! # archetype-ecs
//!
//! Archetype-based Entity-Component-System runtime with stable entity
//! references, cached multi-component queries, and a deferred command
//! buffer.
//!
//! ## Design goals
//! - Columnar archetype storage with slot recycling and opt-in compaction
//! - Entity handles that survive structural mutation
//! - Declarative views with required and optional component bindings
//! - Single-threaded, deterministic system scheduling with per-system
//!   timing statistics
//!
//! ## Model
//!
//! Entities are grouped by their exact component set into archetypes, one
//! columnar pool per component type. The fast [`EntityId`] handle encodes
//! `(archetype, slot)` and goes stale on migration; the heap-allocated
//! [`EntityRef`] is rewritten in place by the store and stays valid until
//! the entity dies. Systems run in registration order once per tick,
//! reading the store through [`Query`] fields and deferring structural
//! mutation into the frame's [`Commands`] buffer, which the [`Scheduler`]
//! flushes at the frame boundary.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::archetype::Archetype;
pub use engine::commands::Commands;
pub use engine::component::{Component, ComponentRegistry, ComponentSet, ComponentValue};
pub use engine::entity::{EntityId, EntityRef};
pub use engine::error::{StorageError, StorageResult};
pub use engine::frame::Frame;
pub use engine::query::Query;
pub use engine::scheduler::{Scheduler, SchedulerStats, SystemStats};
pub use engine::singleton::Singleton;
pub use engine::storage::{ArchetypeStats, Storage, StorageStats};
pub use engine::systems::System;
pub use engine::types::{ArchetypeId, SlotIndex, BLOCK_CAP};
pub use engine::view::{
    Binding, OptRead, OptWrite, Read, View, ViewFetch, ViewIter, ViewShape, Write,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used ECS types.
///
/// Import with:
/// ```rust
/// use archetype_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Commands, ComponentRegistry, EntityId, EntityRef, Frame, OptRead, OptWrite, Query, Read,
        Scheduler, Singleton, Storage, System, View, Write,
    };
}
