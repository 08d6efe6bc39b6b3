//! Core identifier types and storage-layout constants.
//!
//! This module defines the small, copyable identifiers shared by every
//! subsystem of the ECS:
//!
//! - [`ArchetypeId`] names an archetype by the hash of its component set,
//! - [`SlotIndex`] addresses an entity's row inside an archetype,
//! - [`BLOCK_CAP`] fixes the granularity of pool storage blocks.
//!
//! ## Identifier layout
//!
//! An entity identifier packs both values into a single 64-bit integer:
//!
//! ```text
//! | archetype id (32) | slot index (32) |
//! ```
//!
//! The all-zero value is reserved as the invalid identifier, so a live
//! entity id always has at least one bit set. The packed form is defined in
//! [`crate::engine::entity::EntityId`]; this module only fixes the widths.
//!
//! ## Block layout
//!
//! Component pools allocate storage in fixed blocks of [`BLOCK_CAP`] values.
//! The capacity matches the word size of the occupancy bitmap, so each block
//! is tracked by exactly one `u64` word. Blocks are never moved once
//! allocated, which is what keeps interior component pointers stable across
//! appends.

/// Identifier of an archetype.
///
/// The value is a 32-bit FNV-1a style hash folded over the archetype's
/// sorted component type list. It is a performance index, not a security
/// primitive.
pub type ArchetypeId = u32;

/// Index of an entity's row within every pool of its archetype.
///
/// Slot `k` in each pool of one archetype holds the k-th entity of that
/// archetype. Slots are recycled through a free list and renumbered only by
/// compaction.
pub type SlotIndex = u32;

/// Number of component values held per storage block.
///
/// One `u64` occupancy word covers exactly one block.
pub const BLOCK_CAP: usize = 64;
