//! # Step Scheduling Tests
//!
//! Event order, subscriber bookkeeping, query visibility within a step and
//! the flush-to-flush lifetime of changed flags.
//!
//! Run with: cargo test -p zerog_core --test scheduling_test

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use zerog_core::prelude::*;

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct Velocity {
    dx: f64,
    dy: f64,
}

const POSITION: ComponentTypeId = ComponentTypeId::new(0);
const VELOCITY: ComponentTypeId = ComponentTypeId::new(1);

fn new_game() -> Game {
    Game::new(
        GameConfig::new()
            .with_component(ComponentType::from_default::<Position>(0, "Position").unwrap())
            .with_component(ComponentType::from_default::<Velocity>(1, "Velocity").unwrap()),
    )
    .unwrap()
}

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

// ============================================================================
// EVENT ORDER
// ============================================================================

#[test]
fn test_events_fire_in_fixed_order() {
    let mut game = new_game();
    let log: Log = Arc::default();

    // Registered out of order on purpose.
    for event in [
        GameEvent::StepComplete,
        GameEvent::PostStep,
        GameEvent::PreApplyOperations,
        GameEvent::Step,
        GameEvent::PreStep,
    ] {
        let log = Arc::clone(&log);
        game.on(event, move |_| {
            record(&log, event.to_string());
            Ok(())
        });
    }

    game.step(1.0).unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["pre_step", "step", "post_step", "pre_apply_operations", "step_complete"]
    );
}

#[test]
fn test_subscribers_run_in_registration_order() {
    let mut game = new_game();
    let log: Log = Arc::default();
    for name in ["a", "b", "c"] {
        let log = Arc::clone(&log);
        game.on(GameEvent::Step, move |_| {
            record(&log, name);
            Ok(())
        });
    }

    game.step(1.0).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_subscription_changes_apply_next_dispatch() {
    let mut game = new_game();
    let log: Log = Arc::default();

    let late = Arc::clone(&log);
    let victim_log = Arc::clone(&log);
    let victim = Arc::new(Mutex::new(None));
    let victim_id = Arc::clone(&victim);

    game.on(GameEvent::Step, move |game| {
        if game.frame() == 1 {
            let late = Arc::clone(&late);
            game.on(GameEvent::Step, move |_| {
                record(&late, "late");
                Ok(())
            });
            if let Some(id) = victim_id.lock().unwrap().take() {
                assert!(game.off(id));
            }
        }
        Ok(())
    });
    let id = game.on(GameEvent::Step, move |_| {
        record(&victim_log, "victim");
        Ok(())
    });
    *victim.lock().unwrap() = Some(id);

    game.step(1.0).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["victim"]);

    game.step(1.0).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["victim", "late"]);
    assert_eq!(game.subscriber_count(GameEvent::Step), 2);
}

#[test]
fn test_flush_failure_outranks_step_complete_error() {
    let mut game = new_game();
    game.destroy(EntityId::new(5));
    game.on(GameEvent::StepComplete, |_| {
        Err(EcsError::InvariantViolation("step_complete subscriber"))
    });

    let err = game.step(1.0).unwrap_err();
    assert_eq!(err.failures().len(), 1);
    assert!(matches!(err.failures()[0].error, EcsError::EntityNotLive(_)));

    // With a clean flush the subscriber's own error comes through.
    let err = game.step(1.0).unwrap_err();
    assert!(matches!(err, EcsError::InvariantViolation(_)));
}

#[test]
fn test_time_and_delta() {
    let mut game = new_game();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    game.on(GameEvent::PreStep, move |game| {
        sink.lock().unwrap().push((game.delta(), game.time()));
        Ok(())
    });

    game.step(0.5).unwrap();
    game.step(0.25).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![(0.5, 0.5), (0.25, 0.75)]);
}

// ============================================================================
// QUERY VISIBILITY
// ============================================================================

#[test]
fn test_query_excludes_mid_step_add() {
    let mut game = new_game();
    let id = game.create().unwrap();
    game.step(1.0).unwrap();

    let query = game.query(QueryFilter::new().with(POSITION));
    let counts = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&counts);
    game.on(GameEvent::Step, move |game| {
        if game.frame() == 2 {
            game.add(id, POSITION, None);
        }
        let count = game.iter(query).count();
        sink.lock().unwrap().push(count);
        Ok(())
    });
    let sink = Arc::clone(&counts);
    game.on(GameEvent::PostStep, move |game| {
        sink.lock().unwrap().push(game.iter(query).count());
        Ok(())
    });

    game.step(1.0).unwrap(); // frame 2: add is queued
    game.step(1.0).unwrap(); // frame 3: add is committed
    assert_eq!(*counts.lock().unwrap(), vec![0, 0, 1, 1]);
}

#[test]
fn test_query_keeps_entity_pending_removal() {
    let mut game = new_game();
    let id = game.create().unwrap();
    game.add(id, POSITION, None);
    game.step(1.0).unwrap();

    let query = game.query(QueryFilter::new().with(POSITION).without(VELOCITY));
    let counts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&counts);
    game.on(GameEvent::PreApplyOperations, move |game| {
        game.remove(id, POSITION);
        sink.lock().unwrap().push(game.iter(query).count());
        Ok(())
    });

    game.step(1.0).unwrap();
    assert_eq!(*counts.lock().unwrap(), vec![1]);
    assert_eq!(game.iter(query).count(), 0);
}

#[test]
fn test_for_each_mut_updates_values_and_enqueues() {
    let mut game = new_game();
    for i in 0..4 {
        let id = game.create().unwrap();
        let mut velocity = Fields::new();
        velocity.insert("dx".into(), f64::from(i).into());
        game.add(id, POSITION, None);
        game.add(id, VELOCITY, Some(velocity));
    }
    game.step(1.0).unwrap();

    let moving = game.query(QueryFilter::new().with(POSITION).with(VELOCITY));
    game.for_each_mut(moving, |mut entity, commands| {
        let velocity: Velocity = entity.decode(VELOCITY)?;
        let mut position: Position = entity.decode(POSITION)?;
        position.x += velocity.dx;
        entity.encode(POSITION, &position)?;
        if velocity.dx == 0.0 {
            commands.remove(entity.id(), VELOCITY);
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(game.pending_operations(), 1);
    game.step(1.0).unwrap();

    let positioned = game.query(QueryFilter::new().with(POSITION));
    let mut xs: Vec<f64> = game
        .iter(positioned)
        .map(|view| view.decode::<Position>(POSITION).unwrap().x)
        .collect();
    xs.sort_by(f64::total_cmp);
    assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(game.iter(moving).count(), 3);
}

// ============================================================================
// CHANGED FLAGS
// ============================================================================

#[test]
fn test_changed_flags_live_one_step() {
    let mut game = new_game();
    let id = game.create().unwrap();
    game.add(id, POSITION, None);
    game.step(1.0).unwrap();

    let is_changed = |game: &Game| game.get(id).unwrap().get(POSITION).unwrap().is_changed();
    assert!(is_changed(&game)); // Acquired in the last flush

    game.step(1.0).unwrap();
    assert!(!is_changed(&game)); // Cleared at the next flush

    let handle = game.get(id).unwrap().handle(POSITION).unwrap();
    game.mark_changed(handle);
    assert!(!is_changed(&game)); // Still only queued
    game.step(1.0).unwrap();
    assert!(is_changed(&game));
    assert_eq!(game.components().changed(), &[handle]);
}

#[test]
fn test_stale_handle_is_rejected() {
    let mut game = new_game();
    let id = game.create().unwrap();
    game.add(id, POSITION, None);
    game.step(1.0).unwrap();

    let handle = game.get(id).unwrap().handle(POSITION).unwrap();
    game.remove(id, POSITION);
    game.step(1.0).unwrap();

    game.mark_changed(handle);
    let err = game.step(1.0).unwrap_err();
    assert!(matches!(err.failures()[0].error, EcsError::StaleHandle(_)));
}
