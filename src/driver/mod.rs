//! Driver wiring one buffer to a set of producer and consumer threads

use crate::buffer::{BoundedBuffer, BufferStatsView};
use crate::utils::logging::ElapsedLogger;
use crate::utils::time::Jitter;
use crate::worker::{Consumer, ProductionCounter, Producer, Task, TaskReport};
use crate::{Config, Error, Result};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often `join_all` checks for finished workers
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// One report per producer, in creation order
    pub producers: Vec<TaskReport>,
    /// One report per consumer, in creation order
    pub consumers: Vec<TaskReport>,
    /// Buffer counters after every thread joined
    pub buffer: BufferStatsView,
    /// Wall time of the run in milliseconds
    pub elapsed_ms: u64,
}

impl RunReport {
    /// All payloads pushed by the producers, sorted
    pub fn produced_payloads(&self) -> Vec<u64> {
        Self::sorted_payloads(&self.producers)
    }

    /// All payloads popped by the consumers, sorted
    pub fn consumed_payloads(&self) -> Vec<u64> {
        Self::sorted_payloads(&self.consumers)
    }

    fn sorted_payloads(reports: &[TaskReport]) -> Vec<u64> {
        let mut payloads: Vec<u64> = reports
            .iter()
            .flat_map(|report| report.payloads.iter().copied())
            .collect();
        payloads.sort_unstable();
        payloads
    }
}

/// Builds the buffer and the workers, runs them, and waits for all of them
pub struct Driver {
    config: Config,
    buffer: Arc<BoundedBuffer>,
    counter: Arc<ProductionCounter>,
}

impl Driver {
    /// Create a new driver, rejecting configurations that cannot finish
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        info!("start");
        if let Ok(json) = serde_json::to_string(&config) {
            debug!("config: {}", json);
        }

        let buffer = Arc::new(BoundedBuffer::new(config.capacity)?);

        Ok(Self {
            config,
            buffer,
            counter: Arc::new(ProductionCounter::new()),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the shared buffer
    pub fn buffer(&self) -> &Arc<BoundedBuffer> {
        &self.buffer
    }

    /// Start every worker on its own thread and block until all have finished
    pub fn run(self) -> Result<RunReport> {
        let timer = ElapsedLogger::new("run");

        let producers: Vec<Producer> = (1..=self.config.producer_count)
            .map(|n| {
                Producer::new(
                    format!("producer_{}", n),
                    Arc::clone(&self.buffer),
                    Arc::clone(&self.counter),
                    self.config.items_per_producer,
                    Jitter::new(self.config.max_delay),
                )
            })
            .collect();

        let consumers: Vec<Consumer> = (1..=self.config.consumer_count)
            .map(|n| {
                Consumer::new(
                    format!("consumer_{}", n),
                    Arc::clone(&self.buffer),
                    self.config.items_per_consumer,
                    Jitter::new(self.config.max_delay),
                )
            })
            .collect();

        let producer_count = producers.len();
        let mut handles = producers
            .into_iter()
            .map(spawn_task)
            .collect::<Result<Vec<_>>>()?;
        for consumer in consumers {
            handles.push(spawn_task(consumer)?);
        }

        let mut producers = join_all(handles)?;
        let consumers = producers.split_off(producer_count);

        let elapsed_ms = timer.log();
        info!("finish");

        Ok(RunReport {
            producers,
            consumers,
            buffer: self.buffer.stats(),
            elapsed_ms,
        })
    }
}

/// Spawn a task on a thread named after it
fn spawn_task<T: Task>(task: T) -> Result<(String, JoinHandle<TaskReport>)> {
    let name = task.name().to_string();
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || task.run())?;

    Ok((name, handle))
}

/// Join every handle, returning the reports in input order.
///
/// All handles are watched together: a panic in any worker is reported as
/// soon as that worker ends, even while others stay blocked on the buffer.
/// Workers still running at that point are left detached.
fn join_all(handles: Vec<(String, JoinHandle<TaskReport>)>) -> Result<Vec<TaskReport>> {
    let mut reports: Vec<Option<TaskReport>> = handles.iter().map(|_| None).collect();
    let mut pending: Vec<(usize, String, JoinHandle<TaskReport>)> = handles
        .into_iter()
        .enumerate()
        .map(|(index, (name, handle))| (index, name, handle))
        .collect();

    while !pending.is_empty() {
        let mut running = Vec::with_capacity(pending.len());

        for (index, name, handle) in pending {
            if !handle.is_finished() {
                running.push((index, name, handle));
                continue;
            }

            match handle.join() {
                Ok(report) => reports[index] = Some(report),
                Err(_) => {
                    error!("{} panicked", name);
                    return Err(Error::WorkerPanicked(name));
                }
            }
        }

        pending = running;
        if !pending.is_empty() {
            thread::sleep(JOIN_POLL_INTERVAL);
        }
    }

    Ok(reports.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::logging::capture;
    use std::collections::HashSet;
    use std::sync::mpsc;

    /// Task that dies before doing any work
    struct PanickingTask;

    impl Task for PanickingTask {
        fn name(&self) -> &str {
            "failing_consumer"
        }

        fn run(self) -> TaskReport {
            panic!("failing_consumer gave up");
        }
    }

    fn quick_config() -> Config {
        Config {
            max_delay: Duration::from_millis(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_worker_panic_surfaces_while_others_block() {
        let buffer = Arc::new(BoundedBuffer::new(1).unwrap());
        let producer = Producer::new(
            "stuck_producer",
            Arc::clone(&buffer),
            Arc::new(ProductionCounter::new()),
            3,
            Jitter::new(Duration::ZERO),
        );

        // The producer fills the buffer and blocks; nobody else will pop.
        let handles = vec![
            spawn_task(producer).unwrap(),
            spawn_task(PanickingTask).unwrap(),
        ];

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(join_all(handles));
        });

        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("join_all stayed blocked on the stuck producer");
        match result {
            Err(Error::WorkerPanicked(name)) => assert_eq!(name, "failing_consumer"),
            other => panic!("expected WorkerPanicked, got {:?}", other.map(|r| r.len())),
        }

        // Release the detached producer so it can finish.
        for _ in 0..3 {
            buffer.pop("cleanup");
        }
    }

    #[test]
    fn test_join_all_keeps_input_order() {
        let buffer = Arc::new(BoundedBuffer::new(4).unwrap());
        let counter = Arc::new(ProductionCounter::new());

        let slow = Producer::new(
            "slow_producer",
            Arc::clone(&buffer),
            Arc::clone(&counter),
            1,
            Jitter::with_seed(Duration::from_millis(50), 3),
        );
        let fast = Producer::new(
            "fast_producer",
            Arc::clone(&buffer),
            counter,
            1,
            Jitter::new(Duration::ZERO),
        );

        let handles = vec![spawn_task(slow).unwrap(), spawn_task(fast).unwrap()];
        let reports = join_all(handles).unwrap();

        assert_eq!(reports[0].name, "slow_producer");
        assert_eq!(reports[1].name, "fast_producer");
    }

    #[test]
    fn test_lifecycle_log_order() {
        capture::install();

        let config = Config {
            producer_count: 1,
            consumer_count: 1,
            items_per_producer: 1,
            items_per_consumer: 1,
            max_delay: Duration::ZERO,
            ..Default::default()
        };
        Driver::new(config).unwrap().run().unwrap();

        let lines = capture::current_thread_lines();
        let position = |needle: &str| {
            lines
                .iter()
                .position(|line| line == needle)
                .unwrap_or_else(|| panic!("missing log line {:?} in {:?}", needle, lines))
        };

        let start = position("start");
        let created = position("buffer created with capacity 5");
        let producer = position("producer_1 created");
        let consumer = position("consumer_1 created");
        let finish = position("finish");

        assert!(start < created);
        assert!(created < producer);
        assert!(producer < consumer);
        assert!(consumer < finish);
    }

    #[test]
    fn test_driver_rejects_zero_capacity() {
        let config = Config {
            capacity: 0,
            ..quick_config()
        };
        assert!(matches!(Driver::new(config), Err(Error::InvalidCapacity(0))));
    }

    #[test]
    fn test_driver_rejects_unbalanced_config() {
        let config = Config {
            consumer_count: 1,
            ..quick_config()
        };
        assert!(matches!(Driver::new(config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_default_shape_run() {
        let driver = Driver::new(quick_config()).unwrap();
        assert_eq!(driver.buffer().capacity(), 5);
        assert_eq!(driver.config().total_produced(), 20);

        let report = driver.run().unwrap();

        assert_eq!(report.producers.len(), 2);
        assert_eq!(report.consumers.len(), 2);
        assert_eq!(report.producers[0].name, "producer_1");
        assert_eq!(report.consumers[1].name, "consumer_2");

        for task in report.producers.iter().chain(report.consumers.iter()) {
            assert_eq!(task.payloads.len(), 10);
        }

        // No loss, no duplication, payloads 0..20 handed out exactly once.
        let produced = report.produced_payloads();
        assert_eq!(produced, (0..20).collect::<Vec<u64>>());
        assert_eq!(report.consumed_payloads(), produced);

        assert_eq!(report.buffer.pushed, 20);
        assert_eq!(report.buffer.popped, 20);
        assert!(report.buffer.peak_len <= 5);
    }

    #[test]
    fn test_payloads_increase_per_producer() {
        let report = Driver::new(quick_config()).unwrap().run().unwrap();

        for producer in &report.producers {
            assert!(producer.payloads.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_spsc_smoke() {
        let config = Config {
            capacity: 5,
            producer_count: 1,
            consumer_count: 1,
            items_per_producer: 3,
            items_per_consumer: 3,
            max_delay: Duration::from_millis(5),
        };

        let report = Driver::new(config).unwrap().run().unwrap();
        assert_eq!(report.consumers[0].payloads, vec![0, 1, 2]);
    }

    #[test]
    fn test_terminates_with_capacity_one() {
        let config = Config {
            capacity: 1,
            producer_count: 3,
            consumer_count: 2,
            items_per_producer: 4,
            items_per_consumer: 6,
            max_delay: Duration::ZERO,
        };

        let report = Driver::new(config).unwrap().run().unwrap();

        let consumed: HashSet<u64> = report.consumed_payloads().into_iter().collect();
        assert_eq!(consumed.len(), 12);
        assert_eq!(report.buffer.peak_len, 1);
    }

    #[test]
    fn test_single_consumer_sees_fifo_order() {
        let config = Config {
            capacity: 2,
            producer_count: 2,
            consumer_count: 1,
            items_per_producer: 5,
            items_per_consumer: 10,
            max_delay: Duration::ZERO,
        };

        let report = Driver::new(config).unwrap().run().unwrap();
        let seen = &report.consumers[0].payloads;

        // Each producer's items leave the buffer in the order it pushed them.
        for producer in &report.producers {
            let own: Vec<u64> = seen
                .iter()
                .copied()
                .filter(|p| producer.payloads.contains(p))
                .collect();
            assert_eq!(own, producer.payloads);
        }
    }

    #[test]
    fn test_report_serializes() {
        let config = Config {
            producer_count: 1,
            consumer_count: 1,
            items_per_producer: 2,
            items_per_consumer: 2,
            max_delay: Duration::ZERO,
            ..Default::default()
        };

        let report = Driver::new(config).unwrap().run().unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["producers"][0]["role"], "Producer");
        assert_eq!(json["buffer"]["pushed"], 2);
    }
}
