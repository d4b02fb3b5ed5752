//! # Object Pool
//!
//! Recycles whole objects (entity records, scratch buffers) so the flush path
//! does not allocate once warmed up.

use crate::error::{EcsError, EcsResult};

/// A reuse pool for objects that are handed out and returned by value.
///
/// `release` expects the caller to have reset the object's mutable state.
/// The pool grows without bound unless a limit is set; nothing is evicted.
///
/// # Thread Safety
///
/// This pool is NOT synchronized. It lives inside the single-writer `Game`.
///
/// # Example
///
/// ```rust
/// use zerog_core::memory::ObjectPool;
///
/// let mut pool: ObjectPool<Vec<u32>> = ObjectPool::new(Vec::new);
/// let mut buf = pool.acquire().unwrap();
/// buf.push(7);
/// buf.clear();
/// pool.release(buf);
/// assert_eq!(pool.available(), 1);
/// ```
#[derive(Debug)]
pub struct ObjectPool<T> {
    /// Returned objects waiting for reuse.
    free: Vec<T>,
    /// Builds a new object when `free` is empty.
    factory: fn() -> T,
    /// Objects currently handed out.
    outstanding: usize,
    /// Optional hard cap on outstanding objects.
    limit: Option<usize>,
}

impl<T> ObjectPool<T> {
    /// Creates an unbounded pool.
    #[must_use]
    pub fn new(factory: fn() -> T) -> Self {
        Self {
            free: Vec::new(),
            factory,
            outstanding: 0,
            limit: None,
        }
    }

    /// Creates a pool that refuses to hand out more than `limit` objects at once.
    #[must_use]
    pub fn with_limit(factory: fn() -> T, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new(factory)
        }
    }

    /// Number of objects ready for reuse.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of objects currently handed out.
    #[inline]
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Takes a recycled object, or builds one with the factory.
    ///
    /// # Errors
    ///
    /// [`EcsError::PoolExhausted`] when the limit of outstanding objects is hit.
    pub fn acquire(&mut self) -> EcsResult<T> {
        if let Some(capacity) = self.limit {
            if self.outstanding >= capacity {
                return Err(EcsError::PoolExhausted { capacity });
            }
        }
        self.outstanding += 1;
        Ok(self.free.pop().unwrap_or_else(self.factory))
    }

    /// Returns an object for reuse.
    pub fn release(&mut self, object: T) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.free.push(object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuse() {
        let mut pool: ObjectPool<Vec<u32>> = ObjectPool::new(Vec::new);

        let mut buf = pool.acquire().unwrap();
        buf.reserve(64);
        buf.clear();
        pool.release(buf);

        let buf = pool.acquire().unwrap();
        assert!(buf.capacity() >= 64); // Same allocation came back
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_pool_limit() {
        let mut pool: ObjectPool<u8> = ObjectPool::with_limit(u8::default, 2);

        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert!(matches!(
            pool.acquire(),
            Err(EcsError::PoolExhausted { capacity: 2 })
        ));

        pool.release(a);
        assert!(pool.acquire().is_ok());
    }
}
