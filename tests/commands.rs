mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use archetype_ecs::{Commands, EntityId, Frame, Read, Scheduler, System, View};
use common::*;

#[test]
fn queued_operations_are_invisible_until_flush() {
    let mut storage = test_storage();
    let mut commands = Commands::new();

    commands.spawn((Position { x: 1.0, y: 2.0 }, Velocity { dx: 0.5, dy: 0.5 }));
    commands.spawn((Position { x: 3.0, y: 4.0 },));

    let view: View<(Read<Position>,)> = View::new(&storage);
    assert_eq!(view.iter(&mut storage).count(), 0);

    commands.flush(&mut storage);
    assert_eq!(view.iter(&mut storage).count(), 2);
}

#[test]
fn flush_clears_the_buffer_for_reuse() {
    let mut storage = test_storage();
    let mut commands = Commands::new();

    commands.spawn((Position { x: 1.0, y: 1.0 },));
    commands.flush(&mut storage);
    commands.flush(&mut storage);

    let view: View<(Read<Position>,)> = View::new(&storage);
    assert_eq!(view.iter(&mut storage).count(), 1);
}

#[test]
fn deferred_delete_removes_the_entity() {
    let mut storage = test_storage();
    let e1 = storage.spawn((Position { x: 1.0, y: 2.0 },));
    let e2 = storage.spawn((Position { x: 3.0, y: 4.0 },));

    let mut commands = Commands::new();
    commands.delete(e1);
    commands.flush(&mut storage);

    assert_eq!(storage.get_component::<Position>(e1), None);
    assert_eq!(
        storage.get_component::<Position>(e2),
        Some(&Position { x: 3.0, y: 4.0 })
    );
}

#[test]
fn deferred_delete_beats_deferred_add() {
    let mut storage = test_storage();
    let entity = storage.spawn((Position { x: 7.0, y: 8.0 },));

    // Deletes run before adds no matter the recording order, and the add
    // against the dead id is dropped.
    let mut commands = Commands::new();
    commands.add_component(
        entity,
        Health {
            current: 50,
            max: 100,
        },
    );
    commands.delete(entity);
    commands.flush(&mut storage);

    assert_eq!(storage.get_component::<Position>(entity), None);
    assert_eq!(storage.collect_stats().total_entity_count, 0);
}

#[test]
fn rename_chain_tracks_migrations_within_one_flush() {
    let mut storage = test_storage();
    let entity = storage.spawn((Position { x: 1.0, y: 1.0 }, Velocity { dx: 1.0, dy: 1.0 }));
    let reference = storage.create_entity_ref(entity).unwrap();

    // The remove migrates the entity; the add still lands on it because the
    // flush follows the rename chain from the stale id.
    let mut commands = Commands::new();
    commands.remove_component::<Velocity>(entity);
    commands.add_component(
        entity,
        Health {
            current: 9,
            max: 9,
        },
    );
    commands.flush(&mut storage);

    let current = storage.resolve_entity_ref(&reference).unwrap();
    assert!(!storage.has_component::<Velocity>(current));
    assert_eq!(
        storage.get_component::<Health>(current),
        Some(&Health { current: 9, max: 9 })
    );
    assert_eq!(
        storage.get_component::<Position>(current),
        Some(&Position { x: 1.0, y: 1.0 })
    );
    assert_eq!(storage.collect_stats().total_entity_count, 1);
}

#[test]
fn remove_of_last_component_marks_the_entity_deleted() {
    let mut storage = test_storage();
    let entity = storage.spawn((Position { x: 1.0, y: 1.0 },));

    let mut commands = Commands::new();
    commands.remove_component::<Position>(entity);
    commands.add_component(entity, Velocity { dx: 1.0, dy: 1.0 });
    commands.flush(&mut storage);

    // The remove deleted the entity, so the add was dropped instead of
    // resurrecting it as a velocity-only entity.
    assert_eq!(storage.collect_stats().total_entity_count, 0);
}

#[test]
fn defers_run_after_structural_operations() {
    let mut storage = test_storage();
    let order = Arc::new(AtomicUsize::new(0));

    let mut commands = Commands::new();
    commands.spawn((Position { x: 1.0, y: 1.0 },));
    let seen = Arc::clone(&order);
    commands.defer(move || {
        seen.store(1, Ordering::SeqCst);
    });
    let seen = Arc::clone(&order);
    commands.defer(move || {
        // Closures run in insertion order.
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        seen.store(2, Ordering::SeqCst);
    });

    commands.flush(&mut storage);
    assert_eq!(order.load(Ordering::SeqCst), 2);
}

struct DeleteSystem {
    target: EntityId,
}

impl System for DeleteSystem {
    fn execute(&mut self, frame: &mut Frame<'_>) {
        frame.commands.delete(self.target);
    }
}

struct AddHealthSystem {
    target: EntityId,
}

impl System for AddHealthSystem {
    fn execute(&mut self, frame: &mut Frame<'_>) {
        frame.commands.add_component(
            self.target,
            Health {
                current: 50,
                max: 100,
            },
        );
    }
}

struct RemoveVelocitySystem {
    target: EntityId,
}

impl System for RemoveVelocitySystem {
    fn execute(&mut self, frame: &mut Frame<'_>) {
        frame.commands.remove_component::<Velocity>(self.target);
    }
}

struct RemoveHealthSystem {
    target: EntityId,
}

impl System for RemoveHealthSystem {
    fn execute(&mut self, frame: &mut Frame<'_>) {
        frame.commands.remove_component::<Health>(self.target);
    }
}

#[test]
fn deferred_delete_beats_add_across_systems() {
    // Scenario: system A deletes, system B adds to the same entity; after
    // the tick no trace of the entity remains.
    let mut storage = test_storage();
    let entity = storage.spawn((Position { x: 7.0, y: 8.0 },));

    let mut scheduler = Scheduler::new(storage);
    scheduler.register(DeleteSystem { target: entity });
    scheduler.register(AddHealthSystem { target: entity });
    scheduler.once(1.0 / 60.0);

    let storage = scheduler.storage_mut();
    assert_eq!(storage.get_component::<Position>(entity), None);
    let stats = storage.collect_stats();
    assert_eq!(stats.total_entity_count, 0);
}

#[test]
fn chained_migrations_across_systems_resolve_the_same_entity() {
    // Scenario: two systems strip different components off the same entity
    // in one tick, both recording the original id.
    let mut storage = test_storage();
    let entity = storage.spawn((
        Position { x: 5.0, y: 6.0 },
        Velocity { dx: 1.0, dy: 1.0 },
        Health {
            current: 100,
            max: 100,
        },
    ));

    let mut scheduler = Scheduler::new(storage);
    scheduler.register(RemoveVelocitySystem { target: entity });
    scheduler.register(RemoveHealthSystem { target: entity });
    scheduler.once(1.0 / 60.0);

    let storage = scheduler.storage_mut();
    let positions: Vec<Position> = View::<(Read<Position>,)>::new(storage)
        .iter(storage)
        .map(|(_, (position,))| *position)
        .collect();
    assert_eq!(positions, vec![Position { x: 5.0, y: 6.0 }]);

    assert_eq!(
        View::<(Read<Velocity>,)>::new(storage).iter(storage).count(),
        0
    );
    assert_eq!(
        View::<(Read<Health>,)>::new(storage).iter(storage).count(),
        0
    );
}
