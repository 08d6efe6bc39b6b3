//! Deferred mutation buffer.
//!
//! Systems must not restructure storage mid-tick: later systems in the same
//! tick iterate pools whose interior pointers a spawn or delete would
//! invalidate. Instead, structural mutations are recorded in a per-frame
//! [`Commands`] buffer that the scheduler flushes after the last system
//! finishes.
//!
//! ## Flush order
//!
//! The flush order is part of the public contract because systems observe
//! its effects on the next tick: all deletes, then all component removals,
//! then all component additions, then all spawns, then all deferred
//! closures. Within each kind, insertion order is preserved.
//!
//! ## Identity tracking
//!
//! A recorded [`EntityId`] may be stale by the time it is applied: an
//! earlier op in the same flush can migrate the entity and change its id.
//! The flush keeps a rename chain of every migration it performs and
//! resolves each id through the chain before use, so a later
//! `add_component` still finds an entity an earlier `remove_component`
//! moved. Ids deleted during the flush are tracked in a dead set and later
//! ops against them are silently dropped. Holding an
//! [`EntityRef`](crate::engine::entity::EntityRef) and resolving it inside
//! a [`defer`](Commands::defer) closure is the preferred alternative for
//! long chains; the rename chain is the safety net for raw-id callers.

use std::any::TypeId;

use fnv::{FnvHashMap, FnvHashSet};
use smallvec::SmallVec;

use crate::engine::component::{Component, ComponentSet, ComponentValue};
use crate::engine::entity::EntityId;
use crate::engine::storage::Storage;

struct AddCommand {
    entity: EntityId,
    component: ComponentValue,
}

#[derive(Clone, Copy)]
struct RemoveCommand {
    entity: EntityId,
    type_id: TypeId,
}

/// Ordered record of deferred structural mutations.
#[derive(Default)]
pub struct Commands {
    spawns: Vec<SmallVec<[ComponentValue; 8]>>,
    deletes: Vec<EntityId>,
    adds: Vec<AddCommand>,
    removes: Vec<RemoveCommand>,
    defers: Vec<Box<dyn FnOnce() + Send>>,
}

impl Commands {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an entity spawn.
    pub fn spawn<B: ComponentSet>(&mut self, components: B) {
        self.spawns.push(components.into_values());
    }

    /// Queues an entity deletion.
    pub fn delete(&mut self, entity: EntityId) {
        self.deletes.push(entity);
    }

    /// Queues a component addition.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) {
        self.adds.push(AddCommand {
            entity,
            component: ComponentValue::new(component),
        });
    }

    /// Queues a component removal.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) {
        self.removes.push(RemoveCommand {
            entity,
            type_id: TypeId::of::<T>(),
        });
    }

    /// Queues a closure to run at flush time, after all structural ops.
    pub fn defer(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.defers.push(Box::new(callback));
    }

    /// Applies every queued op against `storage` and clears the buffer.
    ///
    /// References to entities that died during this flush are silently
    /// dropped; the flush itself never fails for runtime reasons.
    pub fn flush(&mut self, storage: &mut Storage) {
        let mut deleted: FnvHashSet<EntityId> = FnvHashSet::default();
        let mut moved: FnvHashMap<EntityId, EntityId> = FnvHashMap::default();

        fn resolve(moved: &FnvHashMap<EntityId, EntityId>, mut id: EntityId) -> EntityId {
            while let Some(&next) = moved.get(&id) {
                id = next;
            }
            id
        }

        for &entity in &self.deletes {
            let current = resolve(&moved, entity);
            storage.delete(current);
            deleted.insert(entity);
            deleted.insert(current);
        }

        for command in &self.removes {
            let current = resolve(&moved, command.entity);
            if deleted.contains(&current) {
                continue;
            }
            let new_id = storage.remove_component_by_type(current, command.type_id);
            if !new_id.is_valid() {
                deleted.insert(command.entity);
                deleted.insert(current);
            } else if new_id != current {
                moved.insert(current, new_id);
            }
        }

        for command in self.adds.drain(..) {
            let current = resolve(&moved, command.entity);
            if deleted.contains(&current) {
                continue;
            }
            let new_id = storage.add_component_value(current, command.component);
            if new_id != current {
                moved.insert(current, new_id);
            }
        }

        for components in self.spawns.drain(..) {
            match storage.try_spawn_values(components) {
                Ok(_) => {}
                Err(error) => panic!("deferred spawn failed: {error}"),
            }
        }

        for callback in self.defers.drain(..) {
            callback();
        }

        self.spawns.clear();
        self.deletes.clear();
        self.adds.clear();
        self.removes.clear();
        self.defers.clear();
    }
}
