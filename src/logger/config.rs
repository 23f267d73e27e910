/// Logger configuration stored once per process
use super::levels::LogLevel;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

use super::tags::LogTag;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Messages above this level are suppressed
    pub min_level: LogLevel,
    /// Tags with debug output enabled (debug keys, lowercase)
    pub debug_tags: HashSet<String>,
    /// When non-empty, only these tags are printed (errors always print)
    pub enabled_tags: HashSet<String>,
    pub use_colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            use_colors: true,
        }
    }
}

impl LoggerConfig {
    /// Build a config from CLI-style inputs
    pub fn from_flags(debug_tags: &[String], verbose: bool) -> Self {
        let debug_tags: HashSet<String> = debug_tags.iter().map(|t| t.to_lowercase()).collect();
        let min_level = if verbose {
            LogLevel::Verbose
        } else if debug_tags.is_empty() {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };

        Self {
            min_level,
            debug_tags,
            ..Self::default()
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    match LOGGER_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn set_logger_config(config: LoggerConfig) {
    match LOGGER_CONFIG.write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

pub(super) fn is_debug_enabled_for_tag(config: &LoggerConfig, tag: &LogTag) -> bool {
    config.min_level == LogLevel::Verbose
        || config.debug_tags.contains("all")
        || config.debug_tags.contains(&tag.to_debug_key())
}
