//! Archetype storage.
//!
//! An archetype owns one component pool per member type plus the
//! weak-reference table for its entities. All pools share a single slot
//! index space: slot `k` of every pool belongs to the k-th entity of the
//! archetype, and the pools' occupancy bitmaps always agree.
//!
//! ## Invariants
//!
//! - `types` is sorted by the component identity key and `id` is the hash of
//!   that sorted list.
//! - `pools[i]` stores values of `types[i]`.
//! - A refs-table entry exists only for slots that hold (or held, until the
//!   weak side is reclaimed) an entity with an issued [`EntityRef`].
//!
//! Row-level operations here are deliberately mechanical; the migration and
//! reference-update choreography lives in
//! [`Storage`](crate::engine::storage::Storage), the only caller allowed to
//! mutate archetypes.

use std::any::{Any, TypeId};
use std::sync::Weak;

use fnv::FnvHashMap;
use log::debug;
use smallvec::SmallVec;

use crate::engine::component::{Component, ComponentRegistry, TypeInfo};
use crate::engine::entity::{EntityId, EntityRefCell};
use crate::engine::pool::{BlockPool, ComponentPool};
use crate::engine::types::{ArchetypeId, SlotIndex};

/// Columnar storage for all entities sharing one exact component set.
pub struct Archetype {
    id: ArchetypeId,
    types: SmallVec<[TypeInfo; 8]>,
    pools: Vec<Box<dyn ComponentPool>>,
    refs: FnvHashMap<EntityId, Weak<EntityRefCell>>,
}

impl Archetype {
    /// Instantiates pools for a sorted type list via the registry factories.
    ///
    /// Panics if any member type is unregistered; archetypes are only
    /// reachable through spawn paths that have already validated the types,
    /// so this firing indicates a programmer error.
    pub(crate) fn new(
        id: ArchetypeId,
        types: SmallVec<[TypeInfo; 8]>,
        registry: &ComponentRegistry,
    ) -> Self {
        debug_assert!(!types.is_empty(), "archetype requires at least one type");

        let pools = types
            .iter()
            .map(|info| {
                registry.make_pool(info.type_id).unwrap_or_else(|| {
                    panic!("component type {} is not registered", info.name)
                })
            })
            .collect();

        debug!(
            "created archetype {id:08x} over [{}]",
            types
                .iter()
                .map(|info| info.name)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            id,
            types,
            pools,
            refs: FnvHashMap::default(),
        }
    }

    /// The archetype's identifier, the hash of its sorted type list.
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Number of live entities stored here.
    pub fn len(&self) -> usize {
        self.pools[0].len()
    }

    /// Returns `true` when no entities are stored here.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the member component types, in storage order.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.iter().map(|info| info.name)
    }

    /// Returns `true` if `T` is a member of this archetype.
    pub fn contains<T: Component>(&self) -> bool {
        self.pool_index(TypeId::of::<T>()).is_some()
    }

    /// Iterates the ids of all live entities, in ascending slot order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        let id = self.id;
        self.pools[0].slots().map(move |slot| EntityId::new(id, slot))
    }

    pub(crate) fn types(&self) -> &[TypeInfo] {
        &self.types
    }

    pub(crate) fn pool_index(&self, type_id: TypeId) -> Option<usize> {
        self.types.iter().position(|info| info.type_id == type_id)
    }

    pub(crate) fn pool_at(&self, index: usize) -> &dyn ComponentPool {
        self.pools[index].as_ref()
    }

    pub(crate) fn is_occupied(&self, slot: SlotIndex) -> bool {
        self.pools[0].has(slot)
    }

    pub(crate) fn occupied_slots(&self) -> Vec<SlotIndex> {
        self.pools[0].slots().collect()
    }

    /// Shared access to one component of an entity.
    pub(crate) fn get<T: Component>(&self, slot: SlotIndex) -> Option<&T> {
        let index = self.pool_index(TypeId::of::<T>())?;
        self.pools[index]
            .as_any()
            .downcast_ref::<BlockPool<T>>()?
            .get(slot)
    }

    /// Exclusive access to one component of an entity.
    pub(crate) fn get_mut<T: Component>(&mut self, slot: SlotIndex) -> Option<&mut T> {
        let index = self.pool_index(TypeId::of::<T>())?;
        self.pools[index]
            .as_any_mut()
            .downcast_mut::<BlockPool<T>>()?
            .get_mut(slot)
    }

    /// Appends one full row of component values, pre-sorted to match the
    /// archetype's type order. Returns the shared slot.
    ///
    /// Panics if the pools disagree on the slot, which would mean their
    /// occupancy bitmaps have diverged.
    pub(crate) fn spawn_row(
        &mut self,
        values: SmallVec<[Box<dyn Any + Send>; 8]>,
    ) -> SlotIndex {
        debug_assert_eq!(values.len(), self.pools.len());

        let mut row: Option<SlotIndex> = None;
        for (pool, value) in self.pools.iter_mut().zip(values) {
            let slot = pool.append(value);
            match row {
                None => row = Some(slot),
                Some(expected) if expected != slot => {
                    panic!(
                        "archetype {:08x} pools disagree on spawn slot: {expected} vs {slot}",
                        self.id
                    )
                }
                Some(_) => {}
            }
        }
        row.expect("archetype has at least one pool")
    }

    /// Moves every component value out of a row, releasing the slot in all
    /// pools. Returns the values paired with their type identities, in
    /// storage order.
    pub(crate) fn take_row(
        &mut self,
        slot: SlotIndex,
    ) -> Option<SmallVec<[(TypeInfo, Box<dyn Any + Send>); 8]>> {
        if !self.is_occupied(slot) {
            return None;
        }

        let mut row = SmallVec::new();
        for (info, pool) in self.types.iter().zip(self.pools.iter_mut()) {
            let value = pool
                .take(slot)
                .expect("pool occupancy diverged from archetype row");
            row.push((*info, value));
        }
        Some(row)
    }

    /// Overwrites one component value of an occupied row in place.
    pub(crate) fn replace_at(&mut self, index: usize, slot: SlotIndex, value: Box<dyn Any + Send>) {
        self.pools[index].replace(slot, value);
    }

    /// Deletes a row: zeroes and unlinks any tracked [`EntityRef`], then
    /// releases the slot in every pool. Vacant slots are a silent no-op.
    pub(crate) fn delete_slot(&mut self, slot: SlotIndex) {
        let id = EntityId::new(self.id, slot);
        if let Some(weak) = self.refs.remove(&id) {
            if let Some(cell) = weak.upgrade() {
                cell.store(EntityId::INVALID);
            }
        }
        for pool in &mut self.pools {
            pool.delete(slot);
        }
    }

    /// Registers the weak side of an issued [`EntityRef`].
    pub(crate) fn link_ref(&mut self, id: EntityId, weak: Weak<EntityRefCell>) {
        self.refs.insert(id, weak);
    }

    /// Removes and returns the weak entry for an entity, if any.
    pub(crate) fn unlink_ref(&mut self, id: EntityId) -> Option<Weak<EntityRefCell>> {
        self.refs.remove(&id)
    }

    /// Returns the live ref cell registered for an entity. Dead weak entries
    /// are reclaimed on the way.
    pub(crate) fn live_ref(&mut self, id: EntityId) -> Option<std::sync::Arc<EntityRefCell>> {
        match self.refs.get(&id) {
            Some(weak) => match weak.upgrade() {
                Some(cell) => Some(cell),
                None => {
                    self.refs.remove(&id);
                    None
                }
            },
            None => None,
        }
    }

    /// Compacts every pool and rewrites tracked refs to the new slots.
    ///
    /// The first pool provides the canonical old-to-new mapping; the
    /// ordering rule guarantees every other pool produces the identical
    /// mapping, which is checked in debug builds. Dead weak entries are
    /// dropped rather than rewritten.
    pub(crate) fn compact(&mut self) {
        let before = self.pools[0].slots().last().map_or(0, |slot| slot + 1);
        let mapping = self.pools[0].compact();
        for pool in &mut self.pools[1..] {
            let other = pool.compact();
            debug_assert_eq!(other, mapping, "pool compaction diverged");
        }

        let mut updated: Vec<(EntityId, Weak<EntityRefCell>)> = Vec::new();
        for &(old, new) in &mapping {
            let old_id = EntityId::new(self.id, old);
            if let Some(weak) = self.refs.get(&old_id) {
                if let Some(cell) = weak.upgrade() {
                    let new_id = EntityId::new(self.id, new);
                    cell.store(new_id);
                    updated.push((new_id, weak.clone()));
                }
            }
        }
        self.refs.clear();
        self.refs.extend(updated);

        debug!(
            "compacted archetype {:08x}: {} live slots, high-water mark was {before}",
            self.id,
            mapping.len()
        );
    }
}
