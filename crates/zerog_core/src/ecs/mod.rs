//! # Entity Component System
//!
//! Storage and scheduling primitives driven by [`crate::Game`].
//!
//! ## Design Philosophy
//!
//! - Entities are plain ids; all data lives in pooled component instances
//! - Entities with the same component set share one archetype table
//! - Structural changes are deferred and applied at one flush per step
//! - Queries are cached per archetype, never per entity

pub mod archetype;
mod component;
mod entity;
pub mod events;
mod operation;
pub mod query;
mod storage;
mod view;

pub use archetype::{
    ArchetypeId, ArchetypeManager, ArchetypeSignature, ArchetypeTable, EntityLocation,
    EntityRecord,
};
pub use component::{ComponentHandle, ComponentInstance, ComponentType, ComponentTypeId, Fields};
pub use entity::{EntityId, IdManager};
pub use events::{GameEvent, Subscriber, SubscriptionId};
pub use operation::{Commands, Operation, OperationQueue};
pub use query::{QueryFilter, QueryId, QueryIter, QueryManager};
pub use storage::ComponentManager;
pub use view::{EntityMut, EntityView};
