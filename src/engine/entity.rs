//! Entity identity and stable entity references.
//!
//! ## Identity model
//!
//! Entities carry two kinds of handles:
//!
//! - [`EntityId`], a packed 64-bit value encoding the owning archetype and
//!   the slot inside it. Cheap to copy, hash, and compare, but **not**
//!   stable: adding or removing a component migrates the entity to another
//!   archetype and yields a new id, and compaction renumbers slots.
//! - [`EntityRef`], a heap-allocated handle whose interior id is rewritten
//!   by storage whenever the entity moves. All clones observe the rewrite,
//!   so a ref remains valid across arbitrary structural mutation until the
//!   entity is deleted.
//!
//! ## Reference tracking
//!
//! Storage keeps a weak handle to every issued `EntityRef` inside the
//! entity's current archetype. The user owns the strong side; once the last
//! user clone is dropped, the weak entry dies and is reclaimed lazily during
//! deletes and compaction. This is what lets storage rewrite refs on
//! migration without ever extending their lifetime.
//!
//! ## Invariants
//!
//! - At most one live `EntityRef` allocation exists per entity; repeated
//!   [`Storage::create_entity_ref`](crate::engine::storage::Storage::create_entity_ref)
//!   calls return clones of the same allocation.
//! - A ref whose id is [`EntityId::INVALID`] is permanently dead; every
//!   subsequent resolve observes the same.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::engine::types::{ArchetypeId, SlotIndex};

/// Packed entity identifier.
///
/// The upper 32 bits name the archetype, the lower 32 bits the slot within
/// it. The all-zero value is reserved as [`EntityId::INVALID`].
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

impl EntityId {
    /// The reserved "no entity" value.
    pub const INVALID: EntityId = EntityId(0);

    /// Packs an archetype id and slot index.
    #[inline]
    pub fn new(archetype_id: ArchetypeId, slot: SlotIndex) -> Self {
        Self((archetype_id as u64) << 32 | slot as u64)
    }

    /// Archetype portion of the id.
    #[inline]
    pub fn archetype_id(self) -> ArchetypeId {
        (self.0 >> 32) as ArchetypeId
    }

    /// Slot portion of the id.
    #[inline]
    pub fn slot(self) -> SlotIndex {
        self.0 as SlotIndex
    }

    /// Returns `true` unless this is the reserved invalid id.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub(crate) fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl std::fmt::Debug for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "EntityId({:08x}:{})", self.archetype_id(), self.slot())
        } else {
            f.write_str("EntityId(invalid)")
        }
    }
}

/// Shared cell behind an [`EntityRef`].
///
/// Holds the current entity id as raw bits. Atomic so that a `Storage` and
/// the refs it issued can migrate to another thread as a unit.
#[derive(Debug)]
pub(crate) struct EntityRefCell {
    id: AtomicU64,
}

impl EntityRefCell {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id: AtomicU64::new(id.to_bits()),
        }
    }

    pub(crate) fn load(&self) -> EntityId {
        EntityId::from_bits(self.id.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, id: EntityId) {
        self.id.store(id.to_bits(), Ordering::Relaxed);
    }
}

/// Stable, long-lived reference to an entity.
///
/// Clones share one underlying cell; storage rewrites the cell on migration
/// and zeroes it on deletion. Use
/// [`Storage::resolve_entity_ref`](crate::engine::storage::Storage::resolve_entity_ref)
/// to recover the current [`EntityId`].
#[derive(Clone, Debug)]
pub struct EntityRef {
    cell: Arc<EntityRefCell>,
}

impl EntityRef {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            cell: Arc::new(EntityRefCell::new(id)),
        }
    }

    pub(crate) fn from_cell(cell: Arc<EntityRefCell>) -> Self {
        Self { cell }
    }

    pub(crate) fn downgrade(&self) -> Weak<EntityRefCell> {
        Arc::downgrade(&self.cell)
    }

    pub(crate) fn invalidate(&self) {
        self.cell.store(EntityId::INVALID);
    }

    /// Current id of the referenced entity, or [`EntityId::INVALID`] once
    /// the entity has been deleted.
    pub fn id(&self) -> EntityId {
        self.cell.load()
    }

    /// Returns `true` while the referenced entity exists.
    pub fn is_alive(&self) -> bool {
        self.id().is_valid()
    }

    /// Returns `true` if both refs share the same underlying cell.
    ///
    /// Two refs created for the same live entity always compare equal here;
    /// this is the identity the reference-tracking invariants are stated in
    /// terms of.
    pub fn ptr_eq(a: &EntityRef, b: &EntityRef) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }
}
