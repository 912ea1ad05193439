//! Process logging.
//!
//! Components never write to stdout/stderr directly; they hold an
//! `Arc<dyn LogSink>` and log through the `sink_*!` macros, which compile to
//! nothing when the matching `log-*` feature is disabled.

pub mod log_level;
pub mod log_macros;
pub mod log_msg;
pub mod log_sink;
pub mod logger;
pub mod logger_handle;

pub use log_level::LogLevel;
pub use log_sink::{LogSink, MemoryLogSink, NoopLogSink};
pub use logger::Logger;
pub use logger_handle::LoggerHandle;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the UNIX epoch (0 if the clock is before the epoch).
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
