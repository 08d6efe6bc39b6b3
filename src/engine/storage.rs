//! The storage root: archetype map, entity lifecycle, and migrations.
//!
//! `Storage` is the ownership root of one ECS instance. It owns the
//! component registry, every archetype, and the singleton table, and it is
//! the sole authority for creating archetypes, migrating entities between
//! them, and keeping issued [`EntityRef`]s pointing at the right rows.
//!
//! Migration is take-and-respawn: the source row's values are moved out,
//! the new component set is sorted and hashed to find (or create) the
//! destination archetype, the row is appended there, and the tracked ref,
//! if any, is rewritten to the new id. The old id becomes stale the moment
//! the migration returns, which is why long-lived code holds an `EntityRef`
//! instead.

use std::any::TypeId;

use fnv::FnvHashMap;
use log::trace;
use smallvec::SmallVec;

use crate::engine::archetype::Archetype;
use crate::engine::component::{
    archetype_hash, Component, ComponentRegistry, ComponentSet, ComponentValue, TypeInfo,
};
use crate::engine::entity::{EntityId, EntityRef};
use crate::engine::error::{StorageError, StorageResult};
use crate::engine::singleton::SingletonTable;
use crate::engine::types::ArchetypeId;

/// Root store for one ECS instance.
pub struct Storage {
    registry: ComponentRegistry,
    archetypes: FnvHashMap<ArchetypeId, Archetype>,
    singletons: SingletonTable,
}

impl Storage {
    /// Creates a storage over a populated component registry.
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            archetypes: FnvHashMap::default(),
            singletons: SingletonTable::new(),
        }
    }

    pub(crate) fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Creates a new entity from a tuple of component values.
    ///
    /// # Panics
    ///
    /// Panics if the tuple contains the same component type twice or an
    /// unregistered type. A zero-component spawn is unrepresentable here;
    /// the erased paths reject it at flush time.
    pub fn spawn<B: ComponentSet>(&mut self, components: B) -> EntityId {
        match self.try_spawn_values(components.into_values()) {
            Ok(id) => id,
            Err(error) => panic!("{error}"),
        }
    }

    /// Erased spawn path shared by [`spawn`](Storage::spawn), views, and the
    /// command buffer.
    pub(crate) fn try_spawn_values(
        &mut self,
        values: SmallVec<[ComponentValue; 8]>,
    ) -> StorageResult<EntityId> {
        if values.is_empty() {
            return Err(StorageError::EmptySpawn);
        }

        let mut row: SmallVec<[(TypeInfo, Box<dyn std::any::Any + Send>); 8]> = SmallVec::new();
        for value in values {
            let info = self.registry.resolve(value.type_id, value.name)?;
            row.push((info, value.value));
        }
        row.sort_by_key(|(info, _)| info.key);
        for pair in row.windows(2) {
            if pair[0].0.type_id == pair[1].0.type_id {
                return Err(StorageError::DuplicateComponent {
                    name: pair[0].0.name,
                });
            }
        }

        let infos: SmallVec<[TypeInfo; 8]> = row.iter().map(|(info, _)| *info).collect();
        let archetype_id = archetype_hash(&infos);
        let archetype = self.archetype_entry(archetype_id, &infos);
        let slot = archetype.spawn_row(row.into_iter().map(|(_, value)| value).collect());
        Ok(EntityId::new(archetype_id, slot))
    }

    /// Looks up an archetype by id, creating it for the given sorted type
    /// list when absent.
    pub(crate) fn archetype_entry(
        &mut self,
        id: ArchetypeId,
        infos: &[TypeInfo],
    ) -> &mut Archetype {
        let Self {
            registry,
            archetypes,
            ..
        } = self;
        archetypes
            .entry(id)
            .or_insert_with(|| Archetype::new(id, SmallVec::from_slice(infos), registry))
    }

    /// Deletes an entity and all of its components. Unknown ids and vacant
    /// slots are silent no-ops. Any issued [`EntityRef`] observes the
    /// deletion immediately.
    pub fn delete(&mut self, id: EntityId) {
        if let Some(archetype) = self.archetypes.get_mut(&id.archetype_id()) {
            trace!("delete {id:?}");
            archetype.delete_slot(id.slot());
        }
    }

    /// Adds a component to an entity, migrating it to the archetype that
    /// includes the new type. Returns the entity's new id.
    ///
    /// If the entity already has a component of this type, the value is
    /// replaced in place and the id is returned unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the entity does not exist or the component type is
    /// unregistered.
    pub fn add_component<T: Component>(&mut self, id: EntityId, component: T) -> EntityId {
        self.add_component_value(id, ComponentValue::new(component))
    }

    pub(crate) fn add_component_value(&mut self, id: EntityId, component: ComponentValue) -> EntityId {
        let source = match self.archetypes.get_mut(&id.archetype_id()) {
            Some(archetype) if archetype.is_occupied(id.slot()) => archetype,
            _ => panic!("{}", StorageError::MissingEntity { id }),
        };

        if let Some(index) = source.pool_index(component.type_id) {
            source.replace_at(index, id.slot(), component.value);
            return id;
        }

        let info = match self.registry.resolve(component.type_id, component.name) {
            Ok(info) => info,
            Err(error) => panic!("{error}"),
        };

        let source = self
            .archetypes
            .get_mut(&id.archetype_id())
            .expect("source archetype checked above");
        let weak = source.unlink_ref(id);
        let mut row = source
            .take_row(id.slot())
            .expect("source row checked above");
        row.push((info, component.value));
        row.sort_by_key(|(info, _)| info.key);

        let infos: SmallVec<[TypeInfo; 8]> = row.iter().map(|(info, _)| *info).collect();
        let destination_id = archetype_hash(&infos);
        let destination = self.archetype_entry(destination_id, &infos);
        let slot = destination.spawn_row(row.into_iter().map(|(_, value)| value).collect());
        let new_id = EntityId::new(destination_id, slot);

        if let Some(weak) = weak {
            if let Some(cell) = weak.upgrade() {
                cell.store(new_id);
                destination.link_ref(new_id, weak);
            }
        }

        trace!("migrated {id:?} -> {new_id:?} (add)");
        new_id
    }

    /// Removes a component from an entity, migrating it to the smaller
    /// archetype. Returns the entity's new id, or [`EntityId::INVALID`] when
    /// the last component was removed and the entity was deleted with it.
    ///
    /// Removing a type the entity does not have, or addressing a dead id,
    /// is a no-op returning the input id.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> EntityId {
        self.remove_component_by_type(id, TypeId::of::<T>())
    }

    pub(crate) fn remove_component_by_type(&mut self, id: EntityId, type_id: TypeId) -> EntityId {
        let Some(source) = self.archetypes.get_mut(&id.archetype_id()) else {
            return id;
        };
        if !source.is_occupied(id.slot()) || source.pool_index(type_id).is_none() {
            return id;
        }

        if source.types().len() == 1 {
            source.delete_slot(id.slot());
            trace!("migrated {id:?} -> deleted (removed last component)");
            return EntityId::INVALID;
        }

        let weak = source.unlink_ref(id);
        let row = source.take_row(id.slot()).expect("source row checked above");
        let row: SmallVec<[(TypeInfo, Box<dyn std::any::Any + Send>); 8]> = row
            .into_iter()
            .filter(|(info, _)| info.type_id != type_id)
            .collect();

        let infos: SmallVec<[TypeInfo; 8]> = row.iter().map(|(info, _)| *info).collect();
        let destination_id = archetype_hash(&infos);
        let destination = self.archetype_entry(destination_id, &infos);
        let slot = destination.spawn_row(row.into_iter().map(|(_, value)| value).collect());
        let new_id = EntityId::new(destination_id, slot);

        if let Some(weak) = weak {
            if let Some(cell) = weak.upgrade() {
                cell.store(new_id);
                destination.link_ref(new_id, weak);
            }
        }

        trace!("migrated {id:?} -> {new_id:?} (remove)");
        new_id
    }

    /// Shared access to one component of an entity.
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.archetypes
            .get(&id.archetype_id())
            .and_then(|archetype| archetype.get::<T>(id.slot()))
    }

    /// Exclusive access to one component of an entity.
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.archetypes
            .get_mut(&id.archetype_id())
            .and_then(|archetype| archetype.get_mut::<T>(id.slot()))
    }

    /// Returns `true` if the entity's archetype includes `T`.
    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.archetypes
            .get(&id.archetype_id())
            .is_some_and(|archetype| archetype.contains::<T>())
    }

    /// Returns the stable reference for an entity, creating it on first
    /// request and handing back a clone of the existing one afterwards.
    /// Returns `None` when the id does not resolve to a live entity.
    pub fn create_entity_ref(&mut self, id: EntityId) -> Option<EntityRef> {
        let archetype = self.archetypes.get_mut(&id.archetype_id())?;
        if !archetype.is_occupied(id.slot()) {
            return None;
        }

        if let Some(cell) = archetype.live_ref(id) {
            return Some(EntityRef::from_cell(cell));
        }

        let entity_ref = EntityRef::new(id);
        archetype.link_ref(id, entity_ref.downgrade());
        Some(entity_ref)
    }

    /// Resolves a reference to the entity's current id, or `None` once the
    /// entity has been deleted or the ref invalidated.
    pub fn resolve_entity_ref(&self, entity_ref: &EntityRef) -> Option<EntityId> {
        let id = entity_ref.id();
        id.is_valid().then_some(id)
    }

    /// Severs a reference ahead of natural deletion: the ref observes
    /// deletion semantics while the entity's components are untouched.
    /// Returns `false` if the ref was already dead.
    pub fn invalidate_entity_ref(&mut self, entity_ref: &EntityRef) -> bool {
        let id = entity_ref.id();
        if !id.is_valid() {
            return false;
        }
        if let Some(archetype) = self.archetypes.get_mut(&id.archetype_id()) {
            archetype.unlink_ref(id);
        }
        entity_ref.invalidate();
        true
    }

    /// Stores a singleton value, returning a reference to the stored cell.
    /// Re-adding overwrites the existing cell in place.
    pub fn add_singleton<T: Component>(&mut self, value: T) -> &mut T {
        self.singletons.add(value)
    }

    /// Shared access to a singleton value, if one was added.
    pub fn read_singleton<T: Component>(&self) -> Option<&T> {
        self.singletons.get::<T>()
    }

    /// Exclusive access to a singleton value, if one was added.
    pub fn singleton_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.singletons.get_mut::<T>()
    }

    pub(crate) fn ensure_singleton<T: Component + Default>(&mut self) {
        self.singletons.ensure_default::<T>();
    }

    /// Read-only view of one archetype.
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(&id)
    }

    /// Number of archetypes currently materialized.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub(crate) fn archetypes_iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.values()
    }

    /// Compacts one archetype, renumbering its slots densely. Tracked refs
    /// are rewritten; outstanding raw [`EntityId`]s become stale.
    pub fn compact_archetype(&mut self, id: ArchetypeId) {
        if let Some(archetype) = self.archetypes.get_mut(&id) {
            archetype.compact();
        }
    }

    /// Compacts every archetype.
    pub fn compact(&mut self) {
        for archetype in self.archetypes.values_mut() {
            archetype.compact();
        }
    }

    /// Collects a point-in-time summary of the store.
    pub fn collect_stats(&self) -> StorageStats {
        let mut breakdown: Vec<ArchetypeStats> = self
            .archetypes
            .values()
            .map(|archetype| ArchetypeStats {
                id: archetype.id(),
                component_type_names: archetype.type_names().collect(),
                entity_count: archetype.len(),
            })
            .collect();
        breakdown.sort_unstable_by_key(|stats| stats.id);

        StorageStats {
            archetype_count: self.archetypes.len(),
            total_entity_count: breakdown.iter().map(|stats| stats.entity_count).sum(),
            archetype_breakdown: breakdown,
            singleton_count: self.singletons.count(),
            singleton_type_names: self.singletons.type_names(),
        }
    }
}

/// Summary of one archetype for [`StorageStats`].
#[derive(Clone, Debug)]
pub struct ArchetypeStats {
    /// The archetype's identifier.
    pub id: ArchetypeId,
    /// Names of the member component types, in storage order.
    pub component_type_names: Vec<&'static str>,
    /// Number of live entities in the archetype.
    pub entity_count: usize,
}

/// Point-in-time summary of a [`Storage`].
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of materialized archetypes.
    pub archetype_count: usize,
    /// Live entities across all archetypes.
    pub total_entity_count: usize,
    /// Per-archetype detail, sorted by archetype id.
    pub archetype_breakdown: Vec<ArchetypeStats>,
    /// Number of singleton cells.
    pub singleton_count: usize,
    /// Singleton type names, sorted.
    pub singleton_type_names: Vec<&'static str>,
}
