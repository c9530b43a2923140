//! Shared utilities for verification workflows.

pub mod logging;
pub mod time;

pub use logging::{init_logging, init_tracing, LogFormat};
pub use time::{format_clock, split_duration, DurationParts};
