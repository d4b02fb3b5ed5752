//! # Memory Management
//!
//! Reuse pools for the flush path.
//!
//! - [`ObjectPool`] recycles whole objects handed out by value
//! - [`SlotArena`] keeps values in generational slots addressed by handle

mod arena;
mod pool;

pub use arena::{SlotArena, SlotHandle};
pub use pool::ObjectPool;
