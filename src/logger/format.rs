//! Log line formatting and output
//!
//! Console lines go to stderr so stdout stays clean for the JSON result line
//! printed by the CLI.

use super::config::LoggerConfig;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, ErrorKind, Write};

const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

pub fn format_and_log(config: &LoggerConfig, tag: &LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let line = if config.use_colors {
        format!(
            "{} [{}] [{}] {}",
            time.dimmed(),
            format_tag(tag),
            format_level(level),
            message
        )
    } else {
        format!(
            "{} [{:<tag_width$}] [{:<level_width$}] {}",
            time,
            tag.to_plain_string(),
            level.as_str(),
            message,
            tag_width = TAG_WIDTH,
            level_width = LEVEL_WIDTH
        )
    };

    print_stderr_safe(&line);
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Api => label.bright_purple().bold(),
        LogTag::Pools => label.bright_blue().bold(),
        LogTag::Ohlcv => label.bright_green().bold(),
        LogTag::Database => label.bright_cyan().bold(),
        LogTag::Lifecycle => label.bright_magenta().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug | LogLevel::Verbose => label.dimmed(),
    }
}

/// Write to stderr, exiting quietly when the pipe is closed
fn print_stderr_safe(message: &str) {
    let mut handle = stderr().lock();
    if let Err(e) = writeln!(handle, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
    let _ = handle.flush();
}
