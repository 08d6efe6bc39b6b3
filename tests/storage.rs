mod common;

use archetype_ecs::{ComponentRegistry, EntityId, Storage};
use common::*;

#[test]
fn registry_reports_registered_types() {
    let registry = test_registry();
    assert!(registry.is_registered::<Position>());

    #[derive(Clone, Copy)]
    struct Unseen;
    assert!(!registry.is_registered::<Unseen>());
}

#[test]
fn spawn_returns_components_supplied() {
    let mut storage = test_storage();

    let entity = storage.spawn((
        Position { x: 1.0, y: 2.0 },
        Velocity { dx: 0.5, dy: 0.5 },
    ));

    assert!(entity.is_valid());
    assert_eq!(
        storage.get_component::<Position>(entity),
        Some(&Position { x: 1.0, y: 2.0 })
    );
    assert_eq!(
        storage.get_component::<Velocity>(entity),
        Some(&Velocity { dx: 0.5, dy: 0.5 })
    );
    assert_eq!(storage.get_component::<Health>(entity), None);
}

#[test]
fn spawn_groups_entities_by_component_set() {
    let mut storage = test_storage();

    let a = storage.spawn((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 1.0 }));
    let b = storage.spawn((Velocity { dx: 2.0, dy: 2.0 }, Position { x: 5.0, y: 5.0 }));
    let c = storage.spawn((Position { x: 9.0, y: 9.0 },));

    // Component order in the spawn tuple does not matter; the sorted set does.
    assert_eq!(a.archetype_id(), b.archetype_id());
    assert_ne!(a.archetype_id(), c.archetype_id());
    assert_eq!(storage.archetype_count(), 2);
}

#[test]
#[should_panic(expected = "duplicate component type")]
fn spawn_rejects_duplicate_component_types() {
    let mut storage = test_storage();
    storage.spawn((Position { x: 0.0, y: 0.0 }, Position { x: 1.0, y: 1.0 }));
}

#[test]
#[should_panic(expected = "is not registered")]
fn spawn_rejects_unregistered_component_types() {
    let mut registry = ComponentRegistry::new();
    registry.register::<Position>();
    let mut storage = Storage::new(registry);
    storage.spawn((Health { current: 1, max: 1 },));
}

#[test]
fn deleted_slots_are_reused_by_later_spawns() {
    let mut storage = test_storage();

    let first = storage.spawn((Position { x: 1.0, y: 1.0 },));
    storage.delete(first);
    let second = storage.spawn((Position { x: 2.0, y: 2.0 },));

    assert_eq!(first, second);
    assert_eq!(
        storage.get_component::<Position>(second),
        Some(&Position { x: 2.0, y: 2.0 })
    );
}

#[test]
fn delete_is_silent_for_unknown_ids() {
    let mut storage = test_storage();
    storage.delete(EntityId::INVALID);
    storage.delete(EntityId::new(0xdead_beef, 7));

    let entity = storage.spawn((Position { x: 1.0, y: 1.0 },));
    storage.delete(entity);
    storage.delete(entity);
    assert_eq!(storage.get_component::<Position>(entity), None);
}

#[test]
fn add_component_migrates_entity() {
    let mut storage = test_storage();

    let e0 = storage.spawn((Position { x: 1.0, y: 2.0 },));
    let e1 = storage.add_component(e0, Velocity { dx: 0.5, dy: 0.5 });

    assert_ne!(e0, e1);
    assert_eq!(
        storage.get_component::<Position>(e1),
        Some(&Position { x: 1.0, y: 2.0 })
    );
    assert_eq!(
        storage.get_component::<Velocity>(e1),
        Some(&Velocity { dx: 0.5, dy: 0.5 })
    );
    assert_eq!(storage.get_component::<Position>(e0), None);
}

#[test]
fn add_component_of_present_type_replaces_in_place() {
    let mut storage = test_storage();

    let e0 = storage.spawn((Position { x: 1.0, y: 2.0 }, Velocity { dx: 1.0, dy: 1.0 }));
    let e1 = storage.add_component(e0, Position { x: 9.0, y: 9.0 });

    assert_eq!(e0, e1);
    assert_eq!(
        storage.get_component::<Position>(e1),
        Some(&Position { x: 9.0, y: 9.0 })
    );
    assert_eq!(
        storage.get_component::<Velocity>(e1),
        Some(&Velocity { dx: 1.0, dy: 1.0 })
    );
}

#[test]
#[should_panic(expected = "does not exist")]
fn add_component_on_dead_entity_is_fatal() {
    let mut storage = test_storage();
    let entity = storage.spawn((Position { x: 1.0, y: 1.0 },));
    storage.delete(entity);
    storage.add_component(entity, Velocity { dx: 0.0, dy: 0.0 });
}

#[test]
fn remove_component_round_trip_preserves_remaining_values() {
    let mut storage = test_storage();

    let e0 = storage.spawn((Position { x: 3.0, y: 4.0 }, Velocity { dx: 1.0, dy: 2.0 }));
    let reference = storage.create_entity_ref(e0).unwrap();

    let e1 = storage.add_component(e0, Health { current: 10, max: 10 });
    let e2 = storage.remove_component::<Health>(e1);

    assert!(e2.is_valid());
    assert_eq!(
        storage.get_component::<Position>(e2),
        Some(&Position { x: 3.0, y: 4.0 })
    );
    assert_eq!(
        storage.get_component::<Velocity>(e2),
        Some(&Velocity { dx: 1.0, dy: 2.0 })
    );
    assert!(!storage.has_component::<Health>(e2));

    // The ref follows the whole chain back to the same logical entity.
    assert_eq!(storage.resolve_entity_ref(&reference), Some(e2));
}

#[test]
fn remove_last_component_deletes_entity() {
    let mut storage = test_storage();

    let entity = storage.spawn((Position { x: 1.0, y: 1.0 },));
    let result = storage.remove_component::<Position>(entity);

    assert_eq!(result, EntityId::INVALID);
    assert_eq!(storage.get_component::<Position>(entity), None);
}

#[test]
fn remove_component_of_absent_type_is_a_no_op() {
    let mut storage = test_storage();

    let entity = storage.spawn((Position { x: 1.0, y: 1.0 },));
    let result = storage.remove_component::<Velocity>(entity);

    assert_eq!(result, entity);
    assert_eq!(
        storage.get_component::<Position>(entity),
        Some(&Position { x: 1.0, y: 1.0 })
    );
}

#[test]
fn has_component_reflects_archetype_membership() {
    let mut storage = test_storage();

    let entity = storage.spawn((Position { x: 0.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }));
    assert!(storage.has_component::<Position>(entity));
    assert!(storage.has_component::<Velocity>(entity));
    assert!(!storage.has_component::<Health>(entity));
}

#[test]
fn component_values_are_mutable_in_place() {
    let mut storage = test_storage();

    let entity = storage.spawn((Position { x: 1.0, y: 1.0 },));
    storage.get_component_mut::<Position>(entity).unwrap().x = 42.0;
    assert_eq!(
        storage.get_component::<Position>(entity),
        Some(&Position { x: 42.0, y: 1.0 })
    );
}

#[test]
fn singletons_store_and_overwrite() {
    let mut storage = test_storage();

    assert_eq!(storage.read_singleton::<GameTime>(), None);

    storage.add_singleton(GameTime {
        frames: 1,
        total: 0.5,
    });
    assert_eq!(
        storage.read_singleton::<GameTime>(),
        Some(&GameTime {
            frames: 1,
            total: 0.5
        })
    );

    storage.add_singleton(GameTime {
        frames: 7,
        total: 2.0,
    });
    assert_eq!(
        storage.read_singleton::<GameTime>(),
        Some(&GameTime {
            frames: 7,
            total: 2.0
        })
    );

    storage.singleton_mut::<GameTime>().unwrap().frames += 1;
    assert_eq!(storage.read_singleton::<GameTime>().unwrap().frames, 8);
}

#[test]
fn storage_stats_summarize_archetypes_and_singletons() {
    let mut storage = test_storage();

    let empty = storage.collect_stats();
    assert_eq!(empty.archetype_count, 0);
    assert_eq!(empty.total_entity_count, 0);
    assert_eq!(empty.singleton_count, 0);

    storage.spawn((Score(42), Tag("hello")));
    storage.spawn((Score(100), Tag("world")));
    storage.spawn((Position { x: 0.0, y: 0.0 }, Tag("test")));

    storage.add_singleton(GameTime::default());
    storage.add_singleton(Score(1));

    let stats = storage.collect_stats();
    assert_eq!(stats.archetype_count, 2);
    assert_eq!(stats.total_entity_count, 3);
    assert_eq!(stats.singleton_count, 2);
    assert_eq!(stats.archetype_breakdown.len(), 2);
    assert_eq!(stats.singleton_type_names.len(), 2);

    let mut counts: Vec<usize> = stats
        .archetype_breakdown
        .iter()
        .map(|archetype| archetype.entity_count)
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2]);

    for archetype in &stats.archetype_breakdown {
        assert_eq!(archetype.component_type_names.len(), 2);
    }
}

#[test]
fn archetype_accessors_expose_entities() {
    let mut storage = test_storage();

    let a = storage.spawn((Position { x: 0.0, y: 0.0 },));
    let b = storage.spawn((Position { x: 1.0, y: 1.0 },));

    let archetype = storage.archetype(a.archetype_id()).unwrap();
    assert_eq!(archetype.len(), 2);
    assert!(archetype.contains::<Position>());
    assert!(!archetype.contains::<Velocity>());

    let ids: Vec<EntityId> = archetype.entity_ids().collect();
    assert_eq!(ids, vec![a, b]);
}
