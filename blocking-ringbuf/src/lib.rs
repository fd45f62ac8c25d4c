//! A bounded, blocking FIFO queue for multiple producers and consumers.
//!
//! The queue is a classic monitor: one mutex guards the storage and one
//! condition variable is broadcast on every state change. Waiters always
//! re-check their predicate after waking.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Error types for queue construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A queue must hold at least one element
    ZeroCapacity,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ZeroCapacity => write!(f, "queue capacity must be at least 1"),
        }
    }
}

impl std::error::Error for Error {}

/// State of the queue observed while the lock is still held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Number of elements after the operation completed
    pub len: usize,
    /// Fixed capacity of the queue
    pub capacity: usize,
    /// Whether the caller had to wait before the operation could proceed
    pub waited: bool,
}

/// A bounded blocking Multi Producer Multi Consumer queue
///
/// `push` blocks while the queue is full and `pop` blocks while it is empty.
pub struct BoundedQueue<T> {
    /// Queue storage, oldest element at the front
    storage: Mutex<VecDeque<T>>,
    /// Broadcast on every push and pop
    changed: Condvar,
    /// Maximum number of elements
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a new queue holding at most `capacity` elements
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        Ok(Self {
            storage: Mutex::new(VecDeque::with_capacity(capacity)),
            changed: Condvar::new(),
            capacity,
        })
    }

    /// Get the capacity of the queue
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a value, blocking until there is room for it
    pub fn push(&self, value: T) {
        self.push_with(value, |_, _| {});
    }

    /// Push a value, blocking until there is room for it.
    ///
    /// `inspect` runs with the lock held, right after the value was appended.
    pub fn push_with<F>(&self, value: T, inspect: F)
    where
        F: FnOnce(&T, Snapshot),
    {
        let mut storage = self.storage.lock();
        let mut waited = false;

        while storage.len() >= self.capacity {
            waited = true;
            self.changed.wait(&mut storage);
        }

        storage.push_back(value);
        if let Some(value) = storage.back() {
            inspect(value, self.snapshot(storage.len(), waited));
        }
        self.changed.notify_all();
    }

    /// Pop the oldest value, blocking until one is available
    pub fn pop(&self) -> T {
        self.pop_with(|_, _| {})
    }

    /// Pop the oldest value, blocking until one is available.
    ///
    /// `inspect` runs with the lock held, right after the value was removed.
    pub fn pop_with<F>(&self, inspect: F) -> T
    where
        F: FnOnce(&T, Snapshot),
    {
        let mut storage = self.storage.lock();
        let mut waited = false;

        let value = loop {
            match storage.pop_front() {
                Some(value) => break value,
                None => {
                    waited = true;
                    self.changed.wait(&mut storage);
                }
            }
        };

        inspect(&value, self.snapshot(storage.len(), waited));
        self.changed.notify_all();
        value
    }

    /// Try to push a value without blocking.
    /// Returns the value back if the queue is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        self.try_push_with(value, |_, _| {})
    }

    /// Non-blocking `push_with`
    pub fn try_push_with<F>(&self, value: T, inspect: F) -> Result<(), T>
    where
        F: FnOnce(&T, Snapshot),
    {
        let mut storage = self.storage.lock();
        if storage.len() >= self.capacity {
            return Err(value);
        }

        storage.push_back(value);
        if let Some(value) = storage.back() {
            inspect(value, self.snapshot(storage.len(), false));
        }
        self.changed.notify_all();
        Ok(())
    }

    /// Try to pop the oldest value without blocking
    pub fn try_pop(&self) -> Option<T> {
        self.try_pop_with(|_, _| {})
    }

    /// Non-blocking `pop_with`
    pub fn try_pop_with<F>(&self, inspect: F) -> Option<T>
    where
        F: FnOnce(&T, Snapshot),
    {
        let mut storage = self.storage.lock();
        let value = storage.pop_front()?;

        inspect(&value, self.snapshot(storage.len(), false));
        self.changed.notify_all();
        Some(value)
    }

    /// Get the current number of elements
    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.storage.lock().is_empty()
    }

    /// Check if the queue is full
    pub fn is_full(&self) -> bool {
        self.storage.lock().len() >= self.capacity
    }

    #[inline]
    fn snapshot(&self, len: usize, waited: bool) -> Snapshot {
        Snapshot {
            len,
            capacity: self.capacity,
            waited,
        }
    }
}

impl<T> core::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
