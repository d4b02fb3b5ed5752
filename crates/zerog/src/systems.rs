//! # Demo Systems
//!
//! Each function here is a system factory: it runs once when the game is
//! built, subscribes to step events and returns the cleanup that undoes the
//! subscriptions.
//!
//! | System     | Event        | Reads              | Writes / enqueues        |
//! |------------|--------------|--------------------|--------------------------|
//! | movement   | Step         | Velocity, `bounds` | Position, MarkChanged    |
//! | lifetime   | Step         | Lifetime           | Lifetime, DestroyEntity  |
//! | report     | StepComplete | population         | (log only)               |

use tracing::{debug, info};
use zerog_core::prelude::*;

fn require(game: &Game, name: &str) -> EcsResult<ComponentTypeId> {
    game.component_type_id(name).ok_or_else(|| {
        EcsError::InvalidConfig(format!("system needs component `{name}` to be registered"))
    })
}

fn unsubscribe(subscription: SubscriptionId) -> SystemCleanup {
    Box::new(move |game: &mut Game| {
        game.off(subscription);
    })
}

/// Wraps a coordinate into `[-bounds, bounds)`.
fn wrap(value: f64, bounds: f64) -> f64 {
    let span = bounds * 2.0;
    (value + bounds).rem_euclid(span) - bounds
}

/// Integrates `Position += Velocity * delta`, wrapping at the `bounds` global.
///
/// # Errors
///
/// [`EcsError::InvalidConfig`] if `Position` or `Velocity` is not registered.
pub fn movement(game: &mut Game) -> EcsResult<SystemCleanup> {
    let position = require(game, "Position")?;
    let velocity = require(game, "Velocity")?;
    let moving = game.query(QueryFilter::new().with(position).with(velocity));

    let subscription = game.on(GameEvent::Step, move |game| {
        let delta = game.delta();
        let bounds = game
            .globals()
            .get("bounds")
            .and_then(toml::Value::as_float)
            .filter(|b| *b > 0.0);

        game.for_each_mut(moving, |mut entity, commands| {
            let (dx, dy) = match entity.get(velocity) {
                Some(v) => (v.get_f64("dx").unwrap_or(0.0), v.get_f64("dy").unwrap_or(0.0)),
                None => return Ok(()),
            };
            if dx == 0.0 && dy == 0.0 {
                return Ok(());
            }
            let (mut x, mut y) = match entity.get(position) {
                Some(p) => (p.get_f64("x").unwrap_or(0.0), p.get_f64("y").unwrap_or(0.0)),
                None => return Ok(()),
            };
            x += dx * delta;
            y += dy * delta;
            if let Some(bounds) = bounds {
                x = wrap(x, bounds);
                y = wrap(y, bounds);
            }
            entity.set(position, "x", x)?;
            entity.set(position, "y", y)?;
            if let Some(handle) = entity.handle(position) {
                commands.mark_changed(handle);
            }
            Ok(())
        })
    });
    Ok(unsubscribe(subscription))
}

/// Counts `Lifetime.remaining` down and destroys the entity when it runs out.
///
/// # Errors
///
/// [`EcsError::InvalidConfig`] if `Lifetime` is not registered.
pub fn lifetime(game: &mut Game) -> EcsResult<SystemCleanup> {
    let lifetime = require(game, "Lifetime")?;
    let mortal = game.query(QueryFilter::new().with(lifetime));

    let subscription = game.on(GameEvent::Step, move |game| {
        let delta = game.delta();
        game.for_each_mut(mortal, |mut entity, commands| {
            let remaining = entity
                .get(lifetime)
                .and_then(|l| l.get_f64("remaining"))
                .unwrap_or(0.0)
                - delta;
            entity.set(lifetime, "remaining", remaining)?;
            if remaining <= 0.0 {
                debug!(entity = %entity.id(), "lifetime expired");
                commands.destroy(entity.id());
            }
            Ok(())
        })
    });
    Ok(unsubscribe(subscription))
}

/// Logs the population after every flush.
///
/// # Errors
///
/// Never fails; the signature matches the other factories.
pub fn report(game: &mut Game) -> EcsResult<SystemCleanup> {
    let subscription = game.on(GameEvent::StepComplete, |game| {
        debug!(
            frame = game.frame(),
            time = game.time(),
            live = game.live_entities(),
            changed = game.components().changed().len(),
            archetypes = game.archetypes().archetype_count(),
            "step complete"
        );
        Ok(())
    });
    info!("report system installed");
    Ok(unsubscribe(subscription))
}
