#![allow(dead_code)]

use archetype_ecs::{ComponentRegistry, Storage};

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

pub const ENTITIES_SMALL: usize = 10_000;
pub const ENTITIES_MED: usize = 100_000;

pub fn bench_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register::<Position>();
    registry.register::<Velocity>();
    registry.register::<Health>();
    registry
}

pub fn make_storage() -> Storage {
    Storage::new(bench_registry())
}

pub fn populate(storage: &mut Storage, count: usize) {
    for i in 0..count {
        let f = i as f32;
        if i % 2 == 0 {
            storage.spawn((
                Position { x: f, y: f },
                Velocity { dx: 1.0, dy: 1.0 },
            ));
        } else {
            storage.spawn((
                Position { x: f, y: f },
                Velocity { dx: 1.0, dy: 1.0 },
                Health {
                    current: 100,
                    max: 100,
                },
            ));
        }
    }
}
