//! Singleton components and their accessor handle.
//!
//! Singletons are single-instance components that belong to the storage as a
//! whole rather than to any entity. They bypass the archetype machinery
//! entirely: each value lives in its own heap cell keyed by type, and the
//! cell is written through in place on re-add so interior pointers held by
//! the accessor path stay meaningful. User code reads singletons through the
//! [`Singleton`] handle or the `Storage` accessors, both of which re-fetch
//! the cell on every access.

use std::any::{type_name, Any, TypeId};
use std::collections::hash_map::Entry;
use std::marker::PhantomData;

use fnv::FnvHashMap;

use crate::engine::component::Component;
use crate::engine::storage::Storage;

struct SingletonCell {
    name: &'static str,
    value: Box<dyn Any + Send>,
}

/// Type-keyed table of singleton cells, owned by `Storage`.
#[derive(Default)]
pub(crate) struct SingletonTable {
    cells: FnvHashMap<TypeId, SingletonCell>,
}

impl SingletonTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores a value, overwriting in place when the cell already exists so
    /// the cell allocation survives re-adds.
    pub(crate) fn add<T: Component>(&mut self, value: T) -> &mut T {
        match self.cells.entry(TypeId::of::<T>()) {
            Entry::Occupied(entry) => {
                let cell = entry.into_mut();
                let stored = cell
                    .value
                    .downcast_mut::<T>()
                    .expect("singleton cell holds its keyed type");
                *stored = value;
                stored
            }
            Entry::Vacant(entry) => {
                let cell = entry.insert(SingletonCell {
                    name: type_name::<T>(),
                    value: Box::new(value),
                });
                cell.value
                    .downcast_mut::<T>()
                    .expect("freshly stored singleton type")
            }
        }
    }

    pub(crate) fn get<T: Component>(&self) -> Option<&T> {
        self.cells
            .get(&TypeId::of::<T>())
            .and_then(|cell| cell.value.downcast_ref::<T>())
    }

    pub(crate) fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.cells
            .get_mut(&TypeId::of::<T>())
            .and_then(|cell| cell.value.downcast_mut::<T>())
    }

    /// Creates the cell with a default value when absent.
    pub(crate) fn ensure_default<T: Component + Default>(&mut self) {
        if let Entry::Vacant(entry) = self.cells.entry(TypeId::of::<T>()) {
            entry.insert(SingletonCell {
                name: type_name::<T>(),
                value: Box::new(T::default()),
            });
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.cells.len()
    }

    /// Registered singleton type names, sorted for stable reporting.
    pub(crate) fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.cells.values().map(|cell| cell.name).collect();
        names.sort_unstable();
        names
    }
}

/// Accessor handle for a singleton component.
///
/// Systems embed a `Singleton<T>` field and bind it during registration; the
/// handle guarantees the cell exists (creating the default value when
/// missing) and re-fetches the cell on every access, so it stays correct
/// even if the value is re-added.
pub struct Singleton<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for Singleton<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Component + Default> Singleton<T> {
    /// Creates an unbound handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the singleton exists in `storage`, creating the default value
    /// when absent. Called by the scheduler through
    /// [`System::bind`](crate::engine::systems::System::bind); re-binding is
    /// harmless.
    pub fn bind(&mut self, storage: &mut Storage) {
        storage.ensure_singleton::<T>();
    }

    /// Shared access to the singleton value.
    ///
    /// Panics if the handle was never bound and no value was added through
    /// other means; an unbound read is a programmer error.
    pub fn get<'a>(&self, storage: &'a Storage) -> &'a T {
        storage.read_singleton::<T>().unwrap_or_else(|| {
            panic!(
                "singleton {} read before the accessor was bound",
                type_name::<T>()
            )
        })
    }

    /// Exclusive access to the singleton value, creating the default value
    /// when the cell does not exist yet.
    pub fn get_mut<'a>(&self, storage: &'a mut Storage) -> &'a mut T {
        storage.ensure_singleton::<T>();
        storage
            .singleton_mut::<T>()
            .expect("singleton cell exists after ensure")
    }
}
