#![allow(dead_code)]

//! Shared component types and fixtures for the integration tests.

use archetype_ecs::{ComponentRegistry, Storage};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Name(pub String);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score(pub i32);

#[derive(Clone, Debug, PartialEq)]
pub struct Tag(pub &'static str);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GameTime {
    pub frames: i32,
    pub total: f64,
}

pub fn test_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register::<Position>();
    registry.register::<Velocity>();
    registry.register::<Health>();
    registry.register::<Name>();
    registry.register::<Score>();
    registry.register::<Tag>();
    registry.register::<GameTime>();
    registry
}

pub fn test_storage() -> Storage {
    Storage::new(test_registry())
}
