//! Tag-based structured logging for the backfill engine
//!
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-tag debug control via `--debug <tag>`
//! - Colored console output on stderr (stdout is reserved for run results)
//!
//! ## Usage
//!
//! ```rust
//! use ohlcv_backfill::logger::{self, LogTag};
//!
//! logger::info(LogTag::Ohlcv, "Backfill started");
//! logger::debug(LogTag::Api, "Request details: ..."); // Only with --debug api
//! ```
//!
//! Call [`init`] once at startup before any logging occurs. Without it the
//! default configuration (Info level, no debug tags) applies.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger with an explicit configuration
pub fn init(config: LoggerConfig) {
    set_logger_config(config);
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when debug mode is enabled for the tag.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (only with --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
