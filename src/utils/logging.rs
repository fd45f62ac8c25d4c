//! Logging utilities for prodcons

use env_logger::{Builder, Env, Target};
use log::Level;
use std::io::Write;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Environment variable read for the log filter
pub const LOG_ENV: &str = "RUST_LOG";

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Build the stdout logger used by the binary.
///
/// Lines look like `[<unix-millis>][<LEVEL>] <thread> - <message>`.
pub fn logger_builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().filter_or(LOG_ENV, DEFAULT_FILTER));

    builder.target(Target::Stdout).format(|buf, record| {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let thread = std::thread::current();

        writeln!(
            buf,
            "[{}][{}] {} - {}",
            timestamp,
            record.level(),
            thread.name().unwrap_or("unnamed"),
            record.args()
        )
    });

    builder
}

/// Initialize the global logger
pub fn init_logger() -> Result<(), log::SetLoggerError> {
    logger_builder().try_init()
}

/// Logs how long an operation took
pub struct ElapsedLogger {
    /// Operation name
    operation: String,
    /// Start time
    start_time: Instant,
}

impl ElapsedLogger {
    /// Start timing an operation
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start_time: Instant::now(),
        }
    }

    /// Milliseconds since the logger was created
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Log the elapsed time at info level
    pub fn log(self) -> u64 {
        self.log_with_level(Level::Info)
    }

    /// Log with custom level
    pub fn log_with_level(self, level: Level) -> u64 {
        let elapsed = self.elapsed_ms();
        log::log!(level, "{} took {} ms", self.operation, elapsed);
        elapsed
    }
}
