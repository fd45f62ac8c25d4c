//! Producer and consumer tasks
//!
//! Both run a fixed quota of iterations against a shared [`BoundedBuffer`],
//! pausing for a random duration around each operation.

use crate::buffer::{BoundedBuffer, Item};
use crate::utils::time::Jitter;
use crossbeam_utils::CachePadded;
use log::info;
use serde::Serialize;
use static_assertions::assert_impl_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared source of unique payload values
///
/// Every producer of a run holds the same counter, so payloads are unique
/// across producers and increase in the order they are fetched.
#[derive(Debug, Default)]
pub struct ProductionCounter {
    next: CachePadded<AtomicU64>,
}

assert_impl_all!(ProductionCounter: Send, Sync);

impl ProductionCounter {
    /// Create a counter starting at zero
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a counter starting at `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: CachePadded::new(AtomicU64::new(first)),
        }
    }

    /// Fetch the next payload value and advance the counter
    #[inline]
    pub fn next_value(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Next value the counter will hand out
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Which side of the buffer a task works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskRole {
    Producer,
    Consumer,
}

/// What a finished task did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Task name
    pub name: String,
    /// Producer or consumer
    pub role: TaskRole,
    /// Payloads pushed or popped, in the order the task handled them
    pub payloads: Vec<u64>,
}

/// A unit of work run on its own thread
pub trait Task: Send + 'static {
    /// Name used for the thread and in log lines
    fn name(&self) -> &str;

    /// Run the task to completion
    fn run(self) -> TaskReport;
}

/// Generates a fixed quota of items
pub struct Producer {
    name: String,
    buffer: Arc<BoundedBuffer>,
    counter: Arc<ProductionCounter>,
    quota: usize,
    jitter: Jitter,
}

impl Producer {
    /// Create a new producer
    pub fn new(
        name: impl Into<String>,
        buffer: Arc<BoundedBuffer>,
        counter: Arc<ProductionCounter>,
        quota: usize,
        jitter: Jitter,
    ) -> Self {
        let name = name.into();
        info!("{} created", name);

        Self {
            name,
            buffer,
            counter,
            quota,
            jitter,
        }
    }

    /// Number of items this producer will push
    pub fn quota(&self) -> usize {
        self.quota
    }
}

impl Task for Producer {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(mut self) -> TaskReport {
        let mut payloads = Vec::with_capacity(self.quota);

        for _ in 0..self.quota {
            self.jitter.sleep();

            let item = Item::new(self.name.as_str(), self.counter.next_value());
            payloads.push(item.payload());
            self.buffer.push(item);
        }

        info!("{} finished after producing {} items", self.name, payloads.len());

        TaskReport {
            name: self.name,
            role: TaskRole::Producer,
            payloads,
        }
    }
}

/// Drains a fixed quota of items
pub struct Consumer {
    name: String,
    buffer: Arc<BoundedBuffer>,
    quota: usize,
    jitter: Jitter,
}

impl Consumer {
    /// Create a new consumer
    pub fn new(
        name: impl Into<String>,
        buffer: Arc<BoundedBuffer>,
        quota: usize,
        jitter: Jitter,
    ) -> Self {
        let name = name.into();
        info!("{} created", name);

        Self {
            name,
            buffer,
            quota,
            jitter,
        }
    }

    /// Number of items this consumer will pop
    pub fn quota(&self) -> usize {
        self.quota
    }
}

impl Task for Consumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(mut self) -> TaskReport {
        let mut payloads = Vec::with_capacity(self.quota);

        for _ in 0..self.quota {
            let item = self.buffer.pop(&self.name);
            payloads.push(item.payload());
            drop(item);

            self.jitter.sleep();
        }

        info!("{} finished after consuming {} items", self.name, payloads.len());

        TaskReport {
            name: self.name,
            role: TaskRole::Consumer,
            payloads,
        }
    }
}
