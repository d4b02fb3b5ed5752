//! # Step Loop Benchmark
//!
//! Cost of a full step over a steady population:
//! 1. Empty flush with one movement system iterating every entity
//! 2. Churn: destroy and recreate a slice of the population each step

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zerog_core::prelude::*;

const POSITION: ComponentTypeId = ComponentTypeId::new(0);
const VELOCITY: ComponentTypeId = ComponentTypeId::new(1);

fn schema(id: u16, name: &str, fields: &[&str]) -> ComponentType {
    let defaults = fields
        .iter()
        .map(|f| ((*f).to_owned(), toml::Value::from(0.0)))
        .collect();
    ComponentType::new(id, name, defaults)
}

fn populated_game(count: usize) -> (Game, Vec<EntityId>) {
    let config = GameConfig::new()
        .with_component(schema(0, "Position", &["x", "y"]))
        .with_component(schema(1, "Velocity", &["dx", "dy"]));
    let mut game = Game::new(config).expect("game");

    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let id = game.create().expect("id");
        let mut velocity = Fields::new();
        velocity.insert("dx".into(), 1.0.into());
        game.add(id, POSITION, None);
        game.add(id, VELOCITY, Some(velocity));
        ids.push(id);
    }
    game.step(0.0).expect("seed step");
    (game, ids)
}

fn install_movement(game: &mut Game) {
    let moving = game.query(QueryFilter::new().with(POSITION).with(VELOCITY));
    game.on(GameEvent::Step, move |game| {
        let delta = game.delta();
        game.for_each_mut(moving, |mut entity, _| {
            let dx = entity.get(VELOCITY).and_then(|v| v.get_f64("dx")).unwrap_or(0.0);
            let x = entity.get(POSITION).and_then(|p| p.get_f64("x")).unwrap_or(0.0);
            entity.set(POSITION, "x", x + dx * delta)
        })
    });
}

// =============================================================================
// STEADY STATE
// =============================================================================

fn bench_steady_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("steady_step");
    for count in [1_000usize, 10_000] {
        let (mut game, _) = populated_game(count);
        install_movement(&mut game);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                game.step(0.016).expect("step");
                black_box(game.frame())
            });
        });
    }
    group.finish();
}

// =============================================================================
// CHURN
// =============================================================================

fn bench_churn_step(c: &mut Criterion) {
    let (mut game, mut ids) = populated_game(10_000);
    let mut cursor = 0usize;

    c.bench_function("churn_step_10k_100", |b| {
        b.iter(|| {
            for _ in 0..100 {
                let victim = ids[cursor % ids.len()];
                game.destroy(victim);
                let replacement = game.create().expect("id");
                game.add(replacement, POSITION, None);
                ids[cursor % ids.len()] = replacement;
                cursor += 1;
            }
            game.step(0.016).expect("step");
            black_box(game.live_entities())
        });
    });
}

criterion_group!(benches, bench_steady_step, bench_churn_step);
criterion_main!(benches);
