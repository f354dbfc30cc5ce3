use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use rigid2d::{BodyDef, CircleShape, FixtureDef, PolygonShape, Vec2, World};

const DT: f64 = 1.0 / 60.0;

fn pyramid(base: usize) -> World {
    let mut world = World::default();
    let ground = world
        .create_body(&BodyDef::new_static().with_position(Vec2::new(0.0, -0.5)))
        .unwrap();
    world
        .create_fixture(
            ground,
            &FixtureDef::new(PolygonShape::new_box(40.0, 0.5).unwrap()),
        )
        .unwrap();

    let shape = PolygonShape::new_box(0.5, 0.5).unwrap();
    for row in 0..base {
        for col in 0..(base - row) {
            let x = (col as f64 - (base - row) as f64 * 0.5) * 1.05;
            let y = 0.5 + row as f64;
            let body = world
                .create_body(&BodyDef::new_dynamic().with_position(Vec2::new(x, y)))
                .unwrap();
            world
                .create_fixture(body, &FixtureDef::new(shape).with_density(1.0))
                .unwrap();
        }
    }
    world
}

fn ball_pit(count: usize) -> World {
    let mut world = World::default();
    let ground = world.create_body(&BodyDef::new_static()).unwrap();
    for (center, hx, hy) in [
        (Vec2::new(0.0, -0.5), 10.0, 0.5),
        (Vec2::new(-10.5, 10.0), 0.5, 10.0),
        (Vec2::new(10.5, 10.0), 0.5, 10.0),
    ] {
        let shape = PolygonShape::new_oriented_box(hx, hy, center, 0.0).unwrap();
        world.create_fixture(ground, &FixtureDef::new(shape)).unwrap();
    }

    let shape = CircleShape::new(0.25).unwrap();
    for i in 0..count {
        let x = (i % 30) as f64 * 0.6 - 9.0;
        let y = 1.0 + (i / 30) as f64 * 0.6;
        let body = world
            .create_body(&BodyDef::new_dynamic().with_position(Vec2::new(x, y)))
            .unwrap();
        world
            .create_fixture(body, &FixtureDef::new(shape).with_density(1.0))
            .unwrap();
    }
    world
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    group.bench_function("pyramid_20_60_steps", |b| {
        b.iter_batched(
            || pyramid(20),
            |mut world| {
                for _ in 0..60 {
                    world.step(black_box(DT), 8, 3).unwrap();
                }
                world
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("ball_pit_300_60_steps", |b| {
        b.iter_batched(
            || ball_pit(300),
            |mut world| {
                for _ in 0..60 {
                    world.step(black_box(DT), 8, 3).unwrap();
                }
                world
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
