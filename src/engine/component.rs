//! Component identity and the component registry.
//!
//! This module establishes how Rust types become ECS components:
//!
//! - the [`Component`] marker bound satisfied by any owned value type,
//! - [`TypeInfo`], the process-stable identity used to sort type lists and
//!   hash archetypes,
//! - [`ComponentValue`], a type-erased component carried through spawn and
//!   command paths,
//! - [`ComponentSet`], the tuple adapter that turns `(Position { .. },
//!   Velocity { .. })` into an erased component list,
//! - [`ComponentRegistry`], which maps a component type to the factory that
//!   builds its columnar pool.
//!
//! ## Identity and ordering
//!
//! Every component type gets a 64-bit identity key derived by hashing its
//! `TypeId` with FNV-1a. The key induces the total order used for archetype
//! type lists, and the archetype id is a 32-bit FNV-1a hash folded over the
//! keys of the sorted list. The keys are stable for the lifetime of the
//! process, which is all the ordering contract requires; they are not stable
//! across builds.
//!
//! ## Registration
//!
//! [`ComponentRegistry::register`] must be called for a component type
//! before any entity carries it. Constructing an archetype over an
//! unregistered type is a fatal programmer error. Registration is
//! idempotent and the registry lives as long as the
//! [`Storage`](crate::engine::storage::Storage) that owns it.

use std::any::{type_name, Any, TypeId};
use std::hash::{Hash, Hasher};

use fnv::{FnvHashMap, FnvHasher};
use smallvec::SmallVec;

use crate::engine::error::{StorageError, StorageResult};
use crate::engine::pool::{BlockPool, ComponentPool};
use crate::engine::types::ArchetypeId;

/// Marker bound for component types.
///
/// Any owned `'static` value that can move between threads qualifies. The
/// bound is what guarantees components are self-contained values: borrowed
/// data cannot satisfy `'static`, so a component never aliases storage it
/// does not own.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Process-stable identity of a registered component type.
///
/// Carries the `TypeId` for downcasting, the FNV key used for ordering and
/// archetype hashing, and the type name for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TypeInfo {
    pub(crate) type_id: TypeId,
    pub(crate) key: u64,
    pub(crate) name: &'static str,
}

impl TypeInfo {
    pub(crate) fn of<T: Component>() -> Self {
        let type_id = TypeId::of::<T>();
        Self {
            type_id,
            key: type_key(type_id),
            name: type_name::<T>(),
        }
    }
}

/// Derives the 64-bit ordering key for a component type.
fn type_key(type_id: TypeId) -> u64 {
    let mut hasher = FnvHasher::default();
    type_id.hash(&mut hasher);
    hasher.finish()
}

/// Folds a sorted component type list into a 32-bit archetype id.
///
/// FNV-1a over the full width of every type key. The value zero is remapped
/// to the offset basis because slot 0 of archetype 0 would otherwise collide
/// with the reserved invalid entity id.
pub(crate) fn archetype_hash(types: &[TypeInfo]) -> ArchetypeId {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;

    let mut hash = OFFSET_BASIS;
    for info in types {
        let folded = (info.key as u32) ^ ((info.key >> 32) as u32);
        hash ^= folded;
        hash = hash.wrapping_mul(PRIME);
    }
    if hash == 0 {
        hash = OFFSET_BASIS;
    }
    hash
}

/// A single component value with its type erased.
///
/// Produced by [`ComponentSet`] implementations and by the deferred command
/// buffer; consumed by storage when the value lands in its pool.
pub struct ComponentValue {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) value: Box<dyn Any + Send>,
}

impl ComponentValue {
    /// Erases `value` into a transportable component.
    pub fn new<T: Component>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            value: Box::new(value),
        }
    }
}

impl std::fmt::Debug for ComponentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentValue")
            .field("name", &self.name)
            .finish()
    }
}

/// Conversion from a tuple of component values into an erased list.
///
/// Implemented for tuples of arity 1 through 8. Spawning a single-component
/// entity uses the one-element tuple form: `storage.spawn((Position { x:
/// 0.0, y: 0.0 },))`.
pub trait ComponentSet {
    /// Erases the tuple into individual component values.
    fn into_values(self) -> SmallVec<[ComponentValue; 8]>;
}

macro_rules! impl_component_set {
    ($($field:ident),+) => {
        impl<$($field: Component),+> ComponentSet for ($($field,)+) {
            fn into_values(self) -> SmallVec<[ComponentValue; 8]> {
                #[allow(non_snake_case)]
                let ($($field,)+) = self;
                let mut values = SmallVec::new();
                $(values.push(ComponentValue::new($field));)+
                values
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

/// Factory producing an empty, typed component pool.
type PoolFactory = fn() -> Box<dyn ComponentPool>;

fn pool_factory<T: Component>() -> Box<dyn ComponentPool> {
    Box::new(BlockPool::<T>::new())
}

/// Maps component types to pool factories and identity metadata.
///
/// Each [`Storage`](crate::engine::storage::Storage) owns its registry, so
/// independent ECS instances can coexist without shared global state.
#[derive(Default)]
pub struct ComponentRegistry {
    infos: FnvHashMap<TypeId, TypeInfo>,
    factories: FnvHashMap<TypeId, PoolFactory>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers component type `T`.
    ///
    /// Installs the pool factory used whenever an archetype containing `T`
    /// is created. Registering the same type twice is a no-op.
    pub fn register<T: Component>(&mut self) {
        let info = TypeInfo::of::<T>();
        self.infos.insert(info.type_id, info);
        self.factories
            .insert(info.type_id, pool_factory::<T> as PoolFactory);
    }

    /// Returns `true` if `T` has been registered.
    pub fn is_registered<T: Component>(&self) -> bool {
        self.infos.contains_key(&TypeId::of::<T>())
    }

    /// Looks up the identity of a registered type.
    pub(crate) fn info(&self, type_id: TypeId) -> Option<TypeInfo> {
        self.infos.get(&type_id).copied()
    }

    /// Looks up the identity of a registered type, failing with the type
    /// name when the type is unknown.
    pub(crate) fn resolve(&self, type_id: TypeId, name: &'static str) -> StorageResult<TypeInfo> {
        self.info(type_id)
            .ok_or(StorageError::UnregisteredComponent { name })
    }

    /// Builds an empty pool for a registered type.
    pub(crate) fn make_pool(&self, type_id: TypeId) -> Option<Box<dyn ComponentPool>> {
        self.factories.get(&type_id).map(|factory| factory())
    }
}
