//! # Shared Game Handle
//!
//! `Arc<RwLock<Game>>` with the step barrier built in: `step` takes the
//! exclusive lock, so no reader can observe a half-applied flush and no
//! enqueue can race with one.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ecs::Commands;
use crate::error::EcsResult;
use crate::game::Game;

/// Cloneable, thread-safe handle to a [`Game`].
#[derive(Clone)]
pub struct SharedGame {
    inner: Arc<RwLock<Game>>,
}

impl SharedGame {
    /// Wraps a game.
    #[must_use]
    pub fn new(game: Game) -> Self {
        Self {
            inner: Arc::new(RwLock::new(game)),
        }
    }

    /// Shared access to committed state.
    pub fn read(&self) -> RwLockReadGuard<'_, Game> {
        self.inner.read()
    }

    /// Exclusive access.
    pub fn write(&self) -> RwLockWriteGuard<'_, Game> {
        self.inner.write()
    }

    /// Runs one step under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Whatever [`Game::step`] returns.
    pub fn step(&self, delta: f64) -> EcsResult<()> {
        self.inner.write().step(delta)
    }

    /// Enqueues operations under the exclusive lock.
    pub fn with_commands<R>(&self, f: impl FnOnce(&mut Commands<'_>) -> R) -> R {
        let mut game = self.inner.write();
        let mut commands = game.commands();
        f(&mut commands)
    }

    /// Number of live handles to this game.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
