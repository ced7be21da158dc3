//! # Request Object Pool
//!
//! Reusable request-value instances.
//!
//! Each adapted handler owns one pool for its request type, so two handlers
//! sharing a request type keep separate idle lists.
//!
//! Checkout hands out a [`Pooled`] guard. Dropping the guard returns the
//! instance, reset to `T::default()` if it was touched since the last reset,
//! so every exit path (including decode and handler failures) gives the slot
//! back.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

/// Default number of idle instances kept per request type
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Thread-safe pool of `T` instances
#[derive(Debug)]
pub struct RequestPool<T> {
    idle: Mutex<Vec<Box<T>>>,
    capacity: usize,
}

impl<T: Default> RequestPool<T> {
    /// Create a pool keeping at most `capacity` idle instances
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::with_capacity(capacity.min(DEFAULT_POOL_CAPACITY))),
            capacity,
        })
    }

    /// Take a zero-valued instance out of the pool
    #[must_use]
    pub fn checkout(self: &Arc<Self>) -> Pooled<T> {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        Pooled {
            value: Some(recycled.unwrap_or_default()),
            dirty: false,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle instances waiting for reuse
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn restore(&self, mut value: Box<T>, dirty: bool) {
        if dirty {
            *value = T::default();
        }
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.capacity {
            idle.push(value);
        }
    }
}

/// A checked-out instance, returned to its pool on drop
#[derive(Debug)]
pub struct Pooled<T: Default> {
    value: Option<Box<T>>,
    dirty: bool,
    pool: Arc<RequestPool<T>>,
}

impl<T: Default> Pooled<T> {
    /// Move the current value out, leaving a zero value in the slot
    pub fn take(&mut self) -> T {
        let value = std::mem::take(&mut **self);
        self.dirty = false;
        value
    }
}

impl<T: Default> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_deref().unwrap_or_else(|| unreachable!("pooled value is present until drop"))
    }
}

impl<T: Default> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.dirty = true;
        self.value
            .as_deref_mut()
            .unwrap_or_else(|| unreachable!("pooled value is present until drop"))
    }
}

impl<T: Default> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.restore(value, self.dirty);
        }
    }
}
