//! prodcons - bounded-buffer producer/consumer demonstration
//!
//! Producer threads generate items and consumer threads remove them through a
//! fixed-capacity shared queue that blocks writers when full and readers when
//! empty.

pub mod buffer;
pub mod driver;
pub mod utils;
pub mod worker;

// Re-export key components
pub use buffer::{BoundedBuffer, BufferStatsView, Item};
pub use driver::{Driver, RunReport};
pub use worker::{Consumer, ProductionCounter, Producer, Task, TaskReport, TaskRole};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// prodcons error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid capacity: {0} (a buffer must hold at least one item)")]
    InvalidCapacity(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker '{0}' panicked")]
    WorkerPanicked(String),

    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Buffer capacity
    pub capacity: usize,

    /// Number of producer threads
    pub producer_count: usize,

    /// Number of consumer threads
    pub consumer_count: usize,

    /// Items generated by each producer
    pub items_per_producer: usize,

    /// Items removed by each consumer
    pub items_per_consumer: usize,

    /// Upper bound of the random pause around each push/pop
    pub max_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 5,
            producer_count: 2,
            consumer_count: 2,
            items_per_producer: 10,
            items_per_consumer: 10,
            max_delay: Duration::from_millis(1000),
        }
    }
}

impl Config {
    /// Total number of items the producers will push
    pub fn total_produced(&self) -> usize {
        self.producer_count * self.items_per_producer
    }

    /// Total number of items the consumers will pop
    pub fn total_consumed(&self) -> usize {
        self.consumer_count * self.items_per_consumer
    }

    /// Check the configuration can run to completion.
    ///
    /// Unbalanced totals would leave some thread blocked forever.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidCapacity(self.capacity));
        }

        if self.producer_count == 0 || self.consumer_count == 0 {
            return Err(Error::InvalidConfig(
                "at least one producer and one consumer are required".to_string(),
            ));
        }

        if self.total_produced() != self.total_consumed() {
            return Err(Error::InvalidConfig(format!(
                "producers push {} items but consumers pop {}",
                self.total_produced(),
                self.total_consumed()
            )));
        }

        Ok(())
    }
}
