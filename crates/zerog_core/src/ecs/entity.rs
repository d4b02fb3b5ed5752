//! # Entity Management
//!
//! Entities are bare ids. Id `0` is the reserved sentinel and is never handed
//! out; every operation addressed to it is a silent no-op.
//!
//! Ids are recycled smallest-first, and only once the `DestroyEntity`
//! operation for them has been applied at flush.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Unique identifier for a live entity.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// The "no entity" sentinel.
    pub const NULL: Self = Self(0);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the id as a slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this is the sentinel id.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for EntityId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates and recycles entity ids.
///
/// ```text
/// next:      5            <- next never-used id
/// free:      {2, 4}       <- min-heap of released ids
/// released:  [_, f, t, f, t]
/// ```
///
/// `get` prefers the smallest released id, then `next`. Ids stay strictly
/// below `max_entities`.
#[derive(Debug)]
pub struct IdManager {
    /// Next never-issued id.
    next: u32,
    /// Released ids, smallest on top.
    free: BinaryHeap<Reverse<u32>>,
    /// `released[id]` is true while `id` sits in `free`.
    released: Vec<bool>,
    /// Exclusive upper bound on ids.
    max_entities: u32,
}

impl IdManager {
    /// Creates an allocator issuing ids in `1..max_entities`.
    #[must_use]
    pub fn new(max_entities: u32) -> Self {
        Self {
            next: 1,
            free: BinaryHeap::new(),
            released: Vec::new(),
            max_entities,
        }
    }

    /// Returns the configured exclusive upper bound.
    #[inline]
    #[must_use]
    pub const fn max_entities(&self) -> u32 {
        self.max_entities
    }

    /// Number of ids currently issued and not yet released.
    #[must_use]
    pub fn issued(&self) -> usize {
        (self.next as usize - 1) - self.free.len()
    }

    /// Number of released ids waiting for reuse.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of ids `get` can still hand out.
    #[must_use]
    pub fn available(&self) -> usize {
        self.max_entities.saturating_sub(self.next) as usize + self.free.len()
    }

    /// Issues an id.
    ///
    /// # Errors
    ///
    /// [`EcsError::IdsExhausted`] when every id below `max_entities` is issued.
    pub fn get(&mut self) -> EcsResult<EntityId> {
        if let Some(Reverse(raw)) = self.free.pop() {
            self.released[raw as usize] = false;
            return Ok(EntityId(raw));
        }
        if self.next >= self.max_entities {
            return Err(EcsError::IdsExhausted {
                max_entities: self.max_entities,
            });
        }
        let id = EntityId(self.next);
        self.next += 1;
        Ok(id)
    }

    /// Returns an id to the free list.
    ///
    /// Returns `false` (and changes nothing) for the sentinel, for ids that
    /// were never issued, and for ids that are already free.
    pub fn release(&mut self, id: EntityId) -> bool {
        if id.is_null() || id.0 >= self.next {
            return false;
        }
        let idx = id.index();
        if self.released.len() <= idx {
            self.released.resize(idx + 1, false);
        }
        if self.released[idx] {
            return false;
        }
        self.released[idx] = true;
        self.free.push(Reverse(id.0));
        true
    }

    /// Records an id chosen by the caller as issued.
    ///
    /// Ids skipped between the old high-water mark and `id` become free, so
    /// `get` can still hand them out. Returns `false` for the sentinel and for
    /// ids at or above `max_entities`.
    pub fn reserve(&mut self, id: EntityId) -> bool {
        if id.is_null() || id.0 >= self.max_entities {
            return false;
        }
        if id.0 >= self.next {
            let skipped = self.next..id.0;
            self.next = id.0 + 1;
            for raw in skipped {
                self.release(EntityId(raw));
            }
            return true;
        }
        let idx = id.index();
        if self.released.get(idx).copied().unwrap_or(false) {
            self.released[idx] = false;
            self.free.retain(|Reverse(raw)| *raw != id.0);
        }
        true
    }
}
