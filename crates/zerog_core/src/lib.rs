//! # ZEROG Core Engine
//!
//! Archetype-based Entity Component System with a deferred operation queue.
//!
//! ## Architecture Rules
//!
//! 1. **Decide now, apply later** - mutations are queued and applied at one
//!    flush per step, so every system in a step sees the same population
//! 2. **Canonical archetypes** - entities with the same component set share
//!    one table regardless of the order components were added
//! 3. **Pooled instances** - component data lives in generational slots that
//!    are reset and reused instead of reallocated
//!
//! ## Example
//!
//! ```rust
//! use zerog_core::prelude::*;
//!
//! let mut defaults = Fields::new();
//! defaults.insert("x".into(), 0.0.into());
//! defaults.insert("y".into(), 0.0.into());
//!
//! let mut game = Game::new(
//!     GameConfig::new().with_component(ComponentType::new(0, "Position", defaults)),
//! )
//! .unwrap();
//! let position = ComponentTypeId::new(0);
//!
//! let id = game.create().unwrap();
//! game.add(id, position, None);
//! game.step(1.0).unwrap();
//!
//! let moving = game.query(QueryFilter::new().with(position));
//! assert_eq!(game.iter(moving).count(), 1);
//!
//! game.destroy(id);
//! game.step(1.0).unwrap();
//! assert!(game.get(id).is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod ecs;
mod error;
mod game;
pub mod memory;
pub mod sync;

pub use config::{GameConfig, GameConstants, Globals, SystemCleanup, SystemFactory, WorldManifest};
pub use ecs::{
    ArchetypeId, ArchetypeManager, ArchetypeSignature, Commands, ComponentHandle,
    ComponentInstance, ComponentManager, ComponentType, ComponentTypeId, EntityId, EntityMut,
    EntityView, Fields, GameEvent, IdManager, Operation, QueryFilter, QueryId, QueryIter,
    SubscriptionId,
};
pub use error::{EcsError, EcsResult, ErrorKind, FailedOperation};
pub use game::Game;
pub use sync::SharedGame;

/// Everything a system usually needs.
pub mod prelude {
    pub use crate::{
        Commands, ComponentType, ComponentTypeId, EcsError, EcsResult, EntityId, EntityMut,
        EntityView, Fields, Game, GameConfig, GameEvent, QueryFilter, QueryId, SubscriptionId,
        SystemCleanup,
    };
}
