//! Time utilities for randomized pacing of producers and consumers

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Uniformly random pause source
///
/// Each call to [`Jitter::next_delay`] yields a duration in `[0, max]`,
/// inclusive, at microsecond resolution.
#[derive(Debug)]
pub struct Jitter {
    /// Upper bound (inclusive)
    max: Duration,
    /// Random engine, one per worker
    rng: StdRng,
}

impl Jitter {
    /// Create a new jitter source seeded from the OS
    pub fn new(max: Duration) -> Self {
        Self {
            max,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a reproducible jitter source
    pub fn with_seed(max: Duration, seed: u64) -> Self {
        Self {
            max,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Get the upper bound
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw the next delay
    pub fn next_delay(&mut self) -> Duration {
        let max_micros = u64::try_from(self.max.as_micros()).unwrap_or(u64::MAX);
        if max_micros == 0 {
            return Duration::ZERO;
        }

        Duration::from_micros(self.rng.gen_range(0..=max_micros))
    }

    /// Sleep the current thread for the next delay
    pub fn sleep(&mut self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        delay
    }
}
