//! Cached queries over views.
//!
//! A [`Query`] wraps a [`View`] and remembers which archetypes matched the
//! last time it ran. The cache is invalidated by watching the storage's
//! archetype count: archetypes are never destroyed, so a stable count means
//! the matching set cannot have changed. Iteration itself stays lazy; the
//! cache only short-circuits the match scan.
//!
//! Queries are embedded in systems as plain fields and bound by the
//! scheduler during registration through
//! [`System::bind`](crate::engine::systems::System::bind). Binding twice is
//! safe and simply resets the caches.

use crate::engine::storage::Storage;
use crate::engine::types::ArchetypeId;
use crate::engine::view::{View, ViewIter, ViewShape};

/// A view with a cached matching-archetype set.
pub struct Query<S: ViewShape> {
    view: Option<View<S>>,
    cached_archetypes: Vec<ArchetypeId>,
    last_archetype_count: Option<usize>,
}

impl<S: ViewShape> Default for Query<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ViewShape> Query<S> {
    /// Creates an unbound query. It must be bound to a storage before
    /// iteration; the scheduler does this for registered systems.
    pub fn new() -> Self {
        Self {
            view: None,
            cached_archetypes: Vec::new(),
            last_archetype_count: None,
        }
    }

    /// Binds the query to a storage, building the underlying view and
    /// resetting the archetype cache. Re-binding is safe.
    pub fn bind(&mut self, storage: &Storage) {
        self.view = Some(View::new(storage));
        self.cached_archetypes.clear();
        self.last_archetype_count = None;
    }

    fn refresh(&mut self, storage: &Storage) {
        let count = storage.archetype_count();
        if self.last_archetype_count != Some(count) {
            let view = self.view.as_ref().expect("query bound before refresh");
            self.cached_archetypes = view.matching_archetypes(storage);
            self.last_archetype_count = Some(count);
        }
    }

    /// Iterates `(id, record)` pairs over every matching entity.
    ///
    /// # Panics
    ///
    /// Panics if the query has not been bound to a storage.
    pub fn iter<'a>(&mut self, storage: &'a mut Storage) -> ViewIter<'a, S> {
        assert!(
            self.view.is_some(),
            "query iterated before being bound to a storage"
        );
        self.refresh(storage);
        let view = self.view.as_ref().expect("query bound above");
        view.iter_archetypes(storage, self.cached_archetypes.clone())
    }

    /// Iterates records only, discarding entity ids.
    ///
    /// # Panics
    ///
    /// Panics if the query has not been bound to a storage.
    pub fn values<'a>(&mut self, storage: &'a mut Storage) -> impl Iterator<Item = S::Item<'a>> + 'a {
        self.iter(storage).map(|(_, item)| item)
    }
}
