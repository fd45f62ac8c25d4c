//! Bounded-buffer producer/consumer run with the fixed default configuration

use log::{debug, info};
use prodcons::utils::logging::init_logger;
use prodcons::{Config, Driver, Result};

fn main() -> Result<()> {
    init_logger()?;

    let report = Driver::new(Config::default())?.run()?;

    info!(
        "{} items pushed, {} items popped, buffer peaked at {}",
        report.buffer.pushed, report.buffer.popped, report.buffer.peak_len
    );
    if let Ok(json) = serde_json::to_string(&report) {
        debug!("report: {}", json);
    }

    Ok(())
}
