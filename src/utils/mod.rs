//! Utility modules for prodcons
//!
//! Logger bootstrap and randomized pacing shared by the workers and the binary.

pub mod logging;
pub mod time;
