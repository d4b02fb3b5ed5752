//! # Shared Access
//!
//! The game itself is single-writer. Hosts that read it from other threads
//! (render layer, debug tooling) go through [`SharedGame`]:
//!
//! ```text
//! Logic thread:   write lock -> enqueue / step (flush runs exclusive)
//! Render thread:  read lock  -> get / iter (many readers at once)
//! ```

mod shared;

pub use shared::SharedGame;
