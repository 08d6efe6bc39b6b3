use criterion::*;
use std::hint::black_box;

use archetype_ecs::{Frame, Query, Read, Scheduler, Storage, System, View, Write};

mod common;
use common::*;

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    for &(label, n) in &[("spawn_10k", ENTITIES_SMALL), ("spawn_100k", ENTITIES_MED)] {
        group.bench_function(label, |b| {
            b.iter_batched(
                make_storage,
                |mut storage| {
                    populate(&mut storage, n);
                    black_box(storage);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    let mut storage = make_storage();
    populate(&mut storage, ENTITIES_MED);
    let view: View<(Write<Position>, Read<Velocity>)> = View::new(&storage);

    group.bench_function("view_iter_100k", |b| {
        b.iter(|| {
            for (_, (position, velocity)) in view.iter(&mut storage) {
                position.x += velocity.dx;
                position.y += velocity.dy;
            }
        });
    });

    let mut query: Query<(Write<Position>, Read<Velocity>)> = Query::new();
    query.bind(&storage);

    group.bench_function("query_iter_100k", |b| {
        b.iter(|| {
            for (_, (position, velocity)) in query.iter(&mut storage) {
                position.x += velocity.dx;
                position.y += velocity.dy;
            }
        });
    });

    group.finish();
}

struct MovementSystem {
    entities: Query<(Write<Position>, Read<Velocity>)>,
}

impl System for MovementSystem {
    fn bind(&mut self, storage: &mut Storage) {
        self.entities.bind(storage);
    }

    fn execute(&mut self, frame: &mut Frame<'_>) {
        let dt = frame.delta_time as f32;
        for (_, (position, velocity)) in self.entities.iter(frame.storage) {
            position.x += velocity.dx * dt;
            position.y += velocity.dy * dt;
        }
    }
}

fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    let mut storage = make_storage();
    populate(&mut storage, ENTITIES_MED);
    let mut scheduler = Scheduler::new(storage);
    scheduler.register(MovementSystem {
        entities: Query::new(),
    });

    group.bench_function("tick_100k", |b| {
        b.iter(|| scheduler.once(black_box(1.0 / 60.0)));
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark, iterate_benchmark, tick_benchmark);
criterion_main!(benches);
