//! Buffer module providing the shared bounded queue between producers and consumers
//!
//! This module wraps the blocking-ringbuf crate and adds lifecycle logging and
//! statistics for the items flowing through it.

use crate::{Error, Result};
use blocking_ringbuf::{BoundedQueue, Snapshot};
use log::{debug, info};
use serde::Serialize;
use static_assertions::assert_impl_all;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One unit of work, created by a producer and taken by a consumer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Item {
    creator_id: String,
    payload: u64,
}

impl Item {
    /// Create a new item
    pub fn new(creator_id: impl Into<String>, payload: u64) -> Self {
        Self {
            creator_id: creator_id.into(),
            payload,
        }
    }

    /// Name of the producer that created the item
    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    /// Globally unique payload value
    pub fn payload(&self) -> u64 {
        self.payload
    }
}

/// Buffer statistics
#[derive(Debug, Default)]
pub struct BufferStats {
    pub pushed: AtomicUsize,
    pub popped: AtomicUsize,
    pub blocked_pushes: AtomicUsize,
    pub blocked_pops: AtomicUsize,
    pub peak_len: AtomicUsize,
}

impl BufferStats {
    fn record_push(&self, snap: Snapshot) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.peak_len.fetch_max(snap.len, Ordering::Relaxed);
        if snap.waited {
            self.blocked_pushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_pop(&self, snap: Snapshot) {
        self.popped.fetch_add(1, Ordering::Relaxed);
        if snap.waited {
            self.blocked_pops.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take a point-in-time copy of the counters
    pub fn view(&self) -> BufferStatsView {
        BufferStatsView {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            blocked_pushes: self.blocked_pushes.load(Ordering::Relaxed),
            blocked_pops: self.blocked_pops.load(Ordering::Relaxed),
            peak_len: self.peak_len.load(Ordering::Relaxed),
        }
    }
}

/// Buffer statistics view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferStatsView {
    pub pushed: usize,
    pub popped: usize,
    pub blocked_pushes: usize,
    pub blocked_pops: usize,
    pub peak_len: usize,
}

/// Fixed-capacity FIFO shared by all producers and consumers
///
/// `push` blocks while the buffer is full, `pop` blocks while it is empty.
/// Neither operation can fail.
pub struct BoundedBuffer {
    /// Inner blocking queue
    inner: BoundedQueue<Item>,
    /// Buffer statistics
    stats: BufferStats,
}

assert_impl_all!(BoundedBuffer: Send, Sync);
assert_impl_all!(Item: Send);

impl BoundedBuffer {
    /// Create a new buffer holding at most `capacity` items
    pub fn new(capacity: usize) -> Result<Self> {
        let inner = BoundedQueue::new(capacity).map_err(|_| Error::InvalidCapacity(capacity))?;
        info!("buffer created with capacity {}", capacity);

        Ok(Self {
            inner,
            stats: BufferStats::default(),
        })
    }

    /// Append an item, waiting for free space if the buffer is full
    pub fn push(&self, item: Item) {
        self.inner.push_with(item, |item, snap| {
            self.stats.record_push(snap);
            if snap.waited {
                debug!(
                    "buffer was full, {} waited to push item {}",
                    item.creator_id, item.payload
                );
            }
            info!(
                "item {} from {} pushed to buffer ({}/{})",
                item.payload, item.creator_id, snap.len, snap.capacity
            );
        });
    }

    /// Remove the oldest item on behalf of `caller_id`, waiting if the buffer is empty
    pub fn pop(&self, caller_id: &str) -> Item {
        self.inner.pop_with(|item, snap| {
            self.stats.record_pop(snap);
            if snap.waited {
                debug!(
                    "buffer was empty, {} waited for item {}",
                    caller_id, item.payload
                );
            }
            info!(
                "item {} created by {} taken by {} ({}/{})",
                item.payload, item.creator_id, caller_id, snap.len, snap.capacity
            );
        })
    }

    /// Append an item only if there is room, returning it otherwise
    pub fn try_push(&self, item: Item) -> std::result::Result<(), Item> {
        self.inner.try_push_with(item, |item, snap| {
            self.stats.record_push(snap);
            info!(
                "item {} from {} pushed to buffer ({}/{})",
                item.payload, item.creator_id, snap.len, snap.capacity
            );
        })
    }

    /// Remove the oldest item only if one is available
    pub fn try_pop(&self, caller_id: &str) -> Option<Item> {
        self.inner.try_pop_with(|item, snap| {
            self.stats.record_pop(snap);
            info!(
                "item {} created by {} taken by {} ({}/{})",
                item.payload, item.creator_id, caller_id, snap.len, snap.capacity
            );
        })
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Get current number of buffered items
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// Get buffer statistics
    pub fn stats(&self) -> BufferStatsView {
        self.stats.view()
    }
}
