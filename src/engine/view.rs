//! Declarative component views.
//!
//! A [`View`] binds a tuple of component accessors to every entity whose
//! archetype satisfies them. The tuple elements are small marker types that
//! declare the binding kind:
//!
//! - [`Read<T>`] / [`Write<T>`] require the component and yield `&T` /
//!   `&mut T`,
//! - [`OptRead<T>`] / [`OptWrite<T>`] bind optionally and yield
//!   `Option<&T>` / `Option<&mut T>`; a missing component does not exclude
//!   the entity,
//! - a bare [`EntityId`] element yields the entity's current id and never
//!   constrains matching.
//!
//! ```ignore
//! let view: View<(Write<Position>, Read<Velocity>, OptWrite<Health>)> =
//!     View::new(&storage);
//! for (id, (position, velocity, health)) in view.iter(&mut storage) {
//!     position.x += velocity.dx;
//!     if let Some(health) = health {
//!         health.current -= 1;
//!     }
//! }
//! ```
//!
//! An archetype matches a view iff it contains every required type. The
//! binding list is inspected once at construction; iteration walks matching
//! archetypes and yields interior references into their pools.
//!
//! ## Borrowing model
//!
//! Every accessor takes `&mut Storage` and ties the yielded references to
//! that borrow. Structural mutation is therefore statically impossible
//! while view items are live, which is exactly the pointer-lifetime
//! contract the pools need. Mutable component access reaches through
//! `UnsafeCell` cells; distinct slots and the duplicate-type construction
//! check keep those borrows disjoint.

use std::any::TypeId;
use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

use smallvec::SmallVec;

use crate::engine::archetype::Archetype;
use crate::engine::component::{Component, ComponentRegistry, ComponentValue, TypeInfo};
use crate::engine::entity::{EntityId, EntityRef};
use crate::engine::error::StorageError;
use crate::engine::pool::BlockPool;
use crate::engine::storage::Storage;
use crate::engine::types::{ArchetypeId, SlotIndex};

/// Required shared binding of component `T`.
pub struct Read<T>(PhantomData<T>);

/// Required exclusive binding of component `T`.
pub struct Write<T>(PhantomData<T>);

/// Optional shared binding of component `T`.
pub struct OptRead<T>(PhantomData<T>);

/// Optional exclusive binding of component `T`.
pub struct OptWrite<T>(PhantomData<T>);

/// Resolved binding of one view element to a component type.
pub struct Binding {
    pub(crate) info: TypeInfo,
    pub(crate) optional: bool,
}

fn resolve_binding<T: Component>(registry: &ComponentRegistry, optional: bool) -> Binding {
    let info = match registry.resolve(TypeId::of::<T>(), std::any::type_name::<T>()) {
        Ok(info) => info,
        Err(error) => panic!("{error}"),
    };
    Binding { info, optional }
}

/// One element of a view shape.
///
/// Implemented by the binding markers and by [`EntityId`]; user code does
/// not implement this trait.
pub trait ViewFetch: 'static {
    /// Borrowed form yielded during iteration.
    type Item<'a>;

    /// Owned form consumed by [`View::spawn`].
    type Spawn;

    /// Resolves the element against the registry. `None` marks an
    /// entity-id element, which binds no component.
    fn binding(registry: &ComponentRegistry) -> Option<Binding>;

    /// Converts a spawn input into an erased component, or `None` when the
    /// element contributes no value.
    fn spawn_value(input: Self::Spawn) -> Option<ComponentValue>;

    /// Produces the element's item for one entity.
    ///
    /// # Safety
    ///
    /// `slot` must be occupied in `archetype`, `pool_index` must be the
    /// element's resolved pool position in `archetype`, and the caller must
    /// guarantee exclusive access to the storage for `'a` so that yielded
    /// mutable references cannot alias.
    unsafe fn fetch<'a>(
        archetype: &'a Archetype,
        pool_index: Option<usize>,
        slot: SlotIndex,
        id: EntityId,
    ) -> Option<Self::Item<'a>>;
}

impl<T: Component> ViewFetch for Read<T> {
    type Item<'a> = &'a T;
    type Spawn = T;

    fn binding(registry: &ComponentRegistry) -> Option<Binding> {
        Some(resolve_binding::<T>(registry, false))
    }

    fn spawn_value(input: T) -> Option<ComponentValue> {
        Some(ComponentValue::new(input))
    }

    unsafe fn fetch<'a>(
        archetype: &'a Archetype,
        pool_index: Option<usize>,
        slot: SlotIndex,
        _id: EntityId,
    ) -> Option<&'a T> {
        let pool = archetype
            .pool_at(pool_index?)
            .as_any()
            .downcast_ref::<BlockPool<T>>()?;
        pool.get(slot)
    }
}

impl<T: Component> ViewFetch for Write<T> {
    type Item<'a> = &'a mut T;
    type Spawn = T;

    fn binding(registry: &ComponentRegistry) -> Option<Binding> {
        Some(resolve_binding::<T>(registry, false))
    }

    fn spawn_value(input: T) -> Option<ComponentValue> {
        Some(ComponentValue::new(input))
    }

    unsafe fn fetch<'a>(
        archetype: &'a Archetype,
        pool_index: Option<usize>,
        slot: SlotIndex,
        _id: EntityId,
    ) -> Option<&'a mut T> {
        let pool = archetype
            .pool_at(pool_index?)
            .as_any()
            .downcast_ref::<BlockPool<T>>()?;
        let ptr = pool.slot_ptr(slot)?;
        Some(unsafe { &mut *ptr.as_ptr() })
    }
}

impl<T: Component> ViewFetch for OptRead<T> {
    type Item<'a> = Option<&'a T>;
    type Spawn = Option<T>;

    fn binding(registry: &ComponentRegistry) -> Option<Binding> {
        Some(resolve_binding::<T>(registry, true))
    }

    fn spawn_value(input: Option<T>) -> Option<ComponentValue> {
        input.map(ComponentValue::new)
    }

    unsafe fn fetch<'a>(
        archetype: &'a Archetype,
        pool_index: Option<usize>,
        slot: SlotIndex,
        _id: EntityId,
    ) -> Option<Option<&'a T>> {
        let Some(index) = pool_index else {
            return Some(None);
        };
        let pool = archetype
            .pool_at(index)
            .as_any()
            .downcast_ref::<BlockPool<T>>()?;
        Some(pool.get(slot))
    }
}

impl<T: Component> ViewFetch for OptWrite<T> {
    type Item<'a> = Option<&'a mut T>;
    type Spawn = Option<T>;

    fn binding(registry: &ComponentRegistry) -> Option<Binding> {
        Some(resolve_binding::<T>(registry, true))
    }

    fn spawn_value(input: Option<T>) -> Option<ComponentValue> {
        input.map(ComponentValue::new)
    }

    unsafe fn fetch<'a>(
        archetype: &'a Archetype,
        pool_index: Option<usize>,
        slot: SlotIndex,
        _id: EntityId,
    ) -> Option<Option<&'a mut T>> {
        let Some(index) = pool_index else {
            return Some(None);
        };
        let pool = archetype
            .pool_at(index)
            .as_any()
            .downcast_ref::<BlockPool<T>>()?;
        match pool.slot_ptr(slot) {
            Some(ptr) => Some(Some(unsafe { &mut *ptr.as_ptr() })),
            None => Some(None),
        }
    }
}

impl ViewFetch for EntityId {
    type Item<'a> = EntityId;
    type Spawn = ();

    fn binding(_registry: &ComponentRegistry) -> Option<Binding> {
        None
    }

    fn spawn_value(_input: ()) -> Option<ComponentValue> {
        None
    }

    unsafe fn fetch<'a>(
        _archetype: &'a Archetype,
        _pool_index: Option<usize>,
        _slot: SlotIndex,
        id: EntityId,
    ) -> Option<EntityId> {
        Some(id)
    }
}

/// A tuple of [`ViewFetch`] elements describing a view's record shape.
///
/// Implemented for tuples of arity 1 through 8.
pub trait ViewShape: 'static {
    /// Borrowed record yielded per entity.
    type Item<'a>;

    /// Owned record consumed by [`View::spawn`].
    type Spawn;

    /// Resolves every element against the registry, aligned by position.
    fn bindings(registry: &ComponentRegistry) -> SmallVec<[Option<Binding>; 8]>;

    /// Erases a spawn record into per-element component values.
    fn spawn_values(input: Self::Spawn) -> SmallVec<[Option<ComponentValue>; 8]>;

    /// Produces the record for one entity.
    ///
    /// # Safety
    ///
    /// Same contract as [`ViewFetch::fetch`]; `pool_indices` must align
    /// with the binding list.
    unsafe fn fetch<'a>(
        archetype: &'a Archetype,
        pool_indices: &[Option<usize>],
        slot: SlotIndex,
        id: EntityId,
    ) -> Option<Self::Item<'a>>;
}

macro_rules! impl_view_shape {
    ($(($element:ident, $index:tt)),+) => {
        impl<$($element: ViewFetch),+> ViewShape for ($($element,)+) {
            type Item<'a> = ($($element::Item<'a>,)+);
            type Spawn = ($($element::Spawn,)+);

            fn bindings(registry: &ComponentRegistry) -> SmallVec<[Option<Binding>; 8]> {
                let mut bindings = SmallVec::new();
                $(bindings.push($element::binding(registry));)+
                bindings
            }

            fn spawn_values(input: Self::Spawn) -> SmallVec<[Option<ComponentValue>; 8]> {
                let mut values = SmallVec::new();
                $(values.push($element::spawn_value(input.$index));)+
                values
            }

            unsafe fn fetch<'a>(
                archetype: &'a Archetype,
                pool_indices: &[Option<usize>],
                slot: SlotIndex,
                id: EntityId,
            ) -> Option<Self::Item<'a>> {
                Some(($(
                    unsafe { $element::fetch(archetype, pool_indices[$index], slot, id) }?,
                )+))
            }
        }
    };
}

impl_view_shape!((A, 0));
impl_view_shape!((A, 0), (B, 1));
impl_view_shape!((A, 0), (B, 1), (C, 2));
impl_view_shape!((A, 0), (B, 1), (C, 2), (D, 3));
impl_view_shape!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_view_shape!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_view_shape!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_view_shape!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));

/// Declarative per-entity component binding over a storage.
///
/// Construction inspects the shape once; every access method takes the
/// storage explicitly so the view itself holds no borrow between calls.
pub struct View<S: ViewShape> {
    bindings: SmallVec<[Option<Binding>; 8]>,
    /// Required component types, sorted by identity key.
    required: SmallVec<[TypeInfo; 8]>,
    /// Archetype id cache for spawns that populate exactly the required set.
    cached_spawn_archetype: Cell<Option<ArchetypeId>>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: ViewShape> View<S> {
    /// Builds a view over `storage`'s registry.
    ///
    /// # Panics
    ///
    /// Panics if a bound component type is unregistered or the shape binds
    /// the same component type twice.
    pub fn new(storage: &Storage) -> Self {
        let bindings = S::bindings(storage.registry());

        for (index, binding) in bindings.iter().enumerate() {
            let Some(binding) = binding else { continue };
            for earlier in bindings[..index].iter().flatten() {
                if earlier.info.type_id == binding.info.type_id {
                    panic!(
                        "view shape binds component type {} more than once",
                        binding.info.name
                    );
                }
            }
        }

        let mut required: SmallVec<[TypeInfo; 8]> = bindings
            .iter()
            .flatten()
            .filter(|binding| !binding.optional)
            .map(|binding| binding.info)
            .collect();
        required.sort_by_key(|info| info.key);

        Self {
            bindings,
            required,
            cached_spawn_archetype: Cell::new(None),
            _marker: PhantomData,
        }
    }

    fn matches(&self, archetype: &Archetype) -> bool {
        self.required
            .iter()
            .all(|info| archetype.pool_index(info.type_id).is_some())
    }

    /// Ids of all archetypes containing every required type, sorted for
    /// deterministic iteration order.
    pub(crate) fn matching_archetypes(&self, storage: &Storage) -> Vec<ArchetypeId> {
        let mut ids: Vec<ArchetypeId> = storage
            .archetypes_iter()
            .filter(|archetype| self.matches(archetype))
            .map(|archetype| archetype.id())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Produces the record for one entity, or `None` when the entity does
    /// not exist or lacks a required component.
    pub fn get<'a>(&self, storage: &'a mut Storage, id: EntityId) -> Option<S::Item<'a>> {
        let storage: &'a Storage = storage;
        let archetype = storage.archetype(id.archetype_id())?;
        if !archetype.is_occupied(id.slot()) {
            return None;
        }

        let pool_indices: SmallVec<[Option<usize>; 8]> = self
            .bindings
            .iter()
            .map(|binding| {
                binding
                    .as_ref()
                    .and_then(|binding| archetype.pool_index(binding.info.type_id))
            })
            .collect();

        // Safety: the slot is occupied and the `&mut Storage` parameter
        // guarantees exclusivity for 'a.
        unsafe { S::fetch(archetype, &pool_indices, id.slot(), id) }
    }

    /// Like [`get`](View::get), resolving the entity through a stable
    /// reference first.
    pub fn get_ref<'a>(
        &self,
        storage: &'a mut Storage,
        entity_ref: &EntityRef,
    ) -> Option<S::Item<'a>> {
        let id = storage.resolve_entity_ref(entity_ref)?;
        self.get(storage, id)
    }

    /// Iterates `(id, record)` pairs over every matching entity.
    ///
    /// Yielded references stay valid for the duration of the storage
    /// borrow; structural mutation requires ending the iteration first.
    pub fn iter<'a>(&self, storage: &'a mut Storage) -> ViewIter<'a, S> {
        let ids = self.matching_archetypes(storage);
        self.iter_archetypes(storage, ids)
    }

    /// Iterates records only, discarding entity ids.
    pub fn values<'a>(&self, storage: &'a mut Storage) -> impl Iterator<Item = S::Item<'a>> + 'a {
        self.iter(storage).map(|(_, item)| item)
    }

    pub(crate) fn iter_archetypes<'a>(
        &self,
        storage: &'a mut Storage,
        archetype_ids: Vec<ArchetypeId>,
    ) -> ViewIter<'a, S> {
        ViewIter {
            storage: NonNull::from(storage),
            bindings: self
                .bindings
                .iter()
                .map(|binding| binding.as_ref().map(|b| b.info))
                .collect(),
            archetype_ids: archetype_ids.into_iter(),
            cursor: None,
            _marker: PhantomData,
        }
    }

    /// Creates an entity from an owned record: required elements supply a
    /// value, optional elements supply `Option`s (with `None` skipped), and
    /// an [`EntityId`] element supplies `()`.
    ///
    /// When every populated element is required, the destination archetype
    /// id is cached and reused for subsequent spawns.
    ///
    /// # Panics
    ///
    /// Panics if the record populates no components.
    pub fn spawn(&self, storage: &mut Storage, input: S::Spawn) -> EntityId {
        let values = S::spawn_values(input);

        let mut row: SmallVec<[(TypeInfo, Box<dyn std::any::Any + Send>); 8]> = SmallVec::new();
        for (binding, value) in self.bindings.iter().zip(values) {
            let Some(value) = value else { continue };
            let info = binding
                .as_ref()
                .expect("spawn values align with component bindings")
                .info;
            row.push((info, value.value));
        }
        if row.is_empty() {
            panic!("{}", StorageError::EmptySpawn);
        }
        row.sort_by_key(|(info, _)| info.key);

        let infos: SmallVec<[TypeInfo; 8]> = row.iter().map(|(info, _)| *info).collect();
        let required_only = infos.len() == self.required.len();
        let archetype_id = match self.cached_spawn_archetype.get() {
            Some(cached) if required_only => cached,
            _ => {
                let hash = crate::engine::component::archetype_hash(&infos);
                if required_only {
                    self.cached_spawn_archetype.set(Some(hash));
                }
                hash
            }
        };

        let archetype = storage.archetype_entry(archetype_id, &infos);
        let slot = archetype.spawn_row(row.into_iter().map(|(_, value)| value).collect());
        EntityId::new(archetype_id, slot)
    }
}

struct Cursor {
    archetype: NonNull<Archetype>,
    pool_indices: SmallVec<[Option<usize>; 8]>,
    slots: std::vec::IntoIter<SlotIndex>,
}

/// Lazy iterator over the entities matching a view.
pub struct ViewIter<'a, S: ViewShape> {
    storage: NonNull<Storage>,
    bindings: SmallVec<[Option<TypeInfo>; 8]>,
    archetype_ids: std::vec::IntoIter<ArchetypeId>,
    cursor: Option<Cursor>,
    _marker: PhantomData<(&'a mut Storage, fn() -> S)>,
}

impl<'a, S: ViewShape> ViewIter<'a, S> {
    /// Enters the next matching archetype, snapshotting its occupied slots.
    fn advance_archetype(&mut self) -> bool {
        // Safety: only shared storage access happens here, and the iterator
        // owns the exclusive storage borrow for 'a.
        let storage = unsafe { self.storage.as_ref() };
        for id in self.archetype_ids.by_ref() {
            let Some(archetype) = storage.archetype(id) else {
                continue;
            };
            let pool_indices = self
                .bindings
                .iter()
                .map(|info| info.and_then(|info| archetype.pool_index(info.type_id)))
                .collect();
            self.cursor = Some(Cursor {
                archetype: NonNull::from(archetype),
                pool_indices,
                slots: archetype.occupied_slots().into_iter(),
            });
            return true;
        }
        false
    }
}

impl<'a, S: ViewShape> Iterator for ViewIter<'a, S> {
    type Item = (EntityId, S::Item<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cursor.is_none() && !self.advance_archetype() {
                return None;
            }

            let cursor = self.cursor.as_mut().expect("cursor advanced above");
            match cursor.slots.next() {
                None => self.cursor = None,
                Some(slot) => {
                    // Safety: the archetype outlives 'a because the iterator
                    // holds the exclusive storage borrow; the slot comes
                    // from the occupancy snapshot and cannot have been
                    // released while that borrow is held.
                    let archetype: &'a Archetype =
                        unsafe { &*(cursor.archetype.as_ptr() as *const Archetype) };
                    let id = EntityId::new(archetype.id(), slot);
                    if let Some(item) =
                        unsafe { S::fetch(archetype, &cursor.pool_indices, slot, id) }
                    {
                        return Some((id, item));
                    }
                }
            }
        }
    }
}
