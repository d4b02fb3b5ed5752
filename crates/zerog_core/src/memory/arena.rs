//! # Slot Arena
//!
//! Generational slot storage. A released slot keeps its value so the next
//! acquire can reuse the allocation, and bumps its generation so every
//! handle issued before the release is detectably stale.

use std::fmt;

use crate::error::{EcsError, EcsResult};

/// Handle to an occupied arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotHandle {
    index: u32,
    generation: u32,
}

impl SlotHandle {
    /// Slot index inside the arena.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    occupied: bool,
    value: T,
}

/// Generational arena of reusable slots.
///
/// # Example
///
/// ```rust
/// use zerog_core::memory::SlotArena;
///
/// let mut arena: SlotArena<Vec<u8>> = SlotArena::new(None);
/// let (handle, buf) = arena.acquire_with(Vec::new).unwrap();
/// buf.push(1);
///
/// // Caller resets; the allocation stays in the slot.
/// arena.release(handle).unwrap().clear();
/// assert!(arena.get(handle).is_none());
/// ```
#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    /// Indices of released slots.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    live: usize,
    /// Optional hard cap on the number of slots.
    limit: Option<usize>,
}

impl<T> SlotArena<T> {
    /// Creates an empty arena, optionally capped at `limit` slots.
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            limit,
        }
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Checks if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of released slots ready for reuse.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Total number of slots ever created.
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Occupies a slot, reusing a released one before growing.
    ///
    /// A reused slot hands back its previous value untouched; `factory` only
    /// runs when a new slot has to be created.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolExhausted`] when no slot is free and the cap is reached.
    pub fn acquire_with<F>(&mut self, factory: F) -> EcsResult<(SlotHandle, &mut T)>
    where
        F: FnOnce() -> T,
    {
        let index = if let Some(index) = self.free_list.pop() {
            index
        } else {
            if let Some(capacity) = self.limit {
                if self.slots.len() >= capacity {
                    return Err(EcsError::PoolExhausted { capacity });
                }
            }
            let index = u32::try_from(self.slots.len())
                .map_err(|_| EcsError::PoolExhausted { capacity: u32::MAX as usize })?;
            self.slots.push(Slot {
                generation: 0,
                occupied: false,
                value: factory(),
            });
            index
        };

        let slot = &mut self.slots[index as usize];
        slot.occupied = true;
        self.live += 1;
        let handle = SlotHandle {
            index,
            generation: slot.generation,
        };
        Ok((handle, &mut slot.value))
    }

    /// Frees a slot and returns its value so the caller can reset it.
    ///
    /// Returns `None` for stale or unknown handles.
    pub fn release(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if !slot.occupied || slot.generation != handle.generation {
            return None;
        }
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.live -= 1;
        Some(&mut slot.value)
    }

    /// Checks if the handle still refers to an occupied slot.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets the value behind a live handle.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.occupied && slot.generation == handle.generation).then_some(&slot.value)
    }

    /// Gets the value behind a live handle, mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.occupied && slot.generation == handle.generation {
            Some(&mut slot.value)
        } else {
            None
        }
    }

    /// Iterates over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            // Slots are only pushed after their index passed `u32::try_from`.
            let index = u32::try_from(index).ok()?;
            slot.occupied.then(|| {
                (
                    SlotHandle {
                        index,
                        generation: slot.generation,
                    },
                    &slot.value,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release() {
        let mut arena: SlotArena<u32> = SlotArena::new(None);

        let (h1, v) = arena.acquire_with(|| 42).unwrap();
        assert_eq!(*v, 42);
        assert_eq!(arena.len(), 1);

        assert_eq!(arena.release(h1).copied(), Some(42));
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.free_count(), 1);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut arena: SlotArena<u32> = SlotArena::new(None);

        let (h1, _) = arena.acquire_with(|| 1).unwrap();
        arena.release(h1);
        let (h2, _) = arena.acquire_with(|| 2).unwrap();

        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1.generation(), h2.generation());
        assert!(arena.get(h1).is_none());
        assert!(arena.release(h1).is_none());
        assert!(arena.contains(h2));
    }

    #[test]
    fn test_reused_slot_keeps_value() {
        let mut arena: SlotArena<Vec<u8>> = SlotArena::new(None);

        let (h1, buf) = arena.acquire_with(Vec::new).unwrap();
        buf.extend_from_slice(&[1, 2, 3]);
        arena.release(h1).unwrap().clear();

        let (_, buf) = arena
            .acquire_with(|| panic!("factory must not run for a reused slot"))
            .unwrap();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 3);
    }

    #[test]
    fn test_limit() {
        let mut arena: SlotArena<u8> = SlotArena::new(Some(2));

        let (h1, _) = arena.acquire_with(|| 1).unwrap();
        let _ = arena.acquire_with(|| 2).unwrap();
        assert!(matches!(
            arena.acquire_with(|| 3),
            Err(EcsError::PoolExhausted { capacity: 2 })
        ));

        arena.release(h1);
        assert!(arena.acquire_with(|| 3).is_ok());
        assert_eq!(arena.iter().count(), 2);
    }

    #[test]
    fn test_iter_yields_live_handles() {
        let mut arena: SlotArena<u32> = SlotArena::new(None);
        let (h1, _) = arena.acquire_with(|| 10).unwrap();
        let (h2, _) = arena.acquire_with(|| 20).unwrap();
        arena.release(h1);
        let (h3, _) = arena.acquire_with(|| 30).unwrap();

        let mut seen: Vec<(SlotHandle, u32)> = arena.iter().map(|(h, v)| (h, *v)).collect();
        seen.sort();
        assert_eq!(seen, vec![(h3, 10), (h2, 20)]);
        assert!(seen.iter().all(|(h, _)| arena.contains(*h)));
    }
}
