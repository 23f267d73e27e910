/// Configuration loading: TOML file, environment overrides, validation
use super::schemas::Config;
use crate::logger::{self, LogTag};
use std::path::Path;

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Upper bound for `backfill.pool_refresh_days` (100 years)
const MAX_POOL_REFRESH_DAYS: i64 = 36_500;

/// Load configuration from a specific TOML file
///
/// A missing file is not an error: defaults from the schema definitions are
/// used instead. Sections and fields absent from the file keep their defaults.
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<Config, String> {
    let path = path.as_ref();
    if !path.exists() {
        logger::debug(
            LogTag::Config,
            &format!("Config file '{}' not found, using defaults", path.display()),
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    toml::from_str::<Config>(&contents)
        .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))
}

/// Apply overrides from process environment variables
pub fn apply_env_overrides(config: &mut Config) -> Result<(), String> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides using an arbitrary variable lookup
///
/// Recognised keys: `OHLCV_TARGET_BARS`, `OHLCV_MIN_BARS`, `OHLCV_FETCH_BUFFER`,
/// `OHLCV_POOL_REFRESH_DAYS`, `OHLCV_DB_PATH`, `GECKOTERMINAL_BASE_URL`,
/// `GECKOTERMINAL_RATE_LIMIT`.
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> Result<(), String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("OHLCV_TARGET_BARS") {
        config.backfill.target_bars = parse_override("OHLCV_TARGET_BARS", &value)?;
    }
    if let Some(value) = lookup("OHLCV_MIN_BARS") {
        config.backfill.min_bars = parse_override("OHLCV_MIN_BARS", &value)?;
    }
    if let Some(value) = lookup("OHLCV_FETCH_BUFFER") {
        config.backfill.fetch_buffer = parse_override("OHLCV_FETCH_BUFFER", &value)?;
    }
    if let Some(value) = lookup("OHLCV_POOL_REFRESH_DAYS") {
        config.backfill.pool_refresh_days = parse_override("OHLCV_POOL_REFRESH_DAYS", &value)?;
    }
    if let Some(value) = lookup("OHLCV_DB_PATH") {
        config.database.path = value;
    }
    if let Some(value) = lookup("GECKOTERMINAL_BASE_URL") {
        config.geckoterminal.base_url = value.trim_end_matches('/').to_string();
    }
    if let Some(value) = lookup("GECKOTERMINAL_RATE_LIMIT") {
        config.geckoterminal.rate_limit_per_minute =
            parse_override("GECKOTERMINAL_RATE_LIMIT", &value)?;
    }
    Ok(())
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("Invalid value for {}: '{}'", key, value))
}

/// Reject configurations the pipeline cannot run with
pub fn validate_config(config: &Config) -> Result<(), String> {
    let backfill = &config.backfill;
    if backfill.target_bars == 0 {
        return Err("backfill.target_bars must be greater than zero".to_string());
    }
    if backfill.min_bars > backfill.target_bars {
        return Err(format!(
            "backfill.min_bars ({}) cannot exceed backfill.target_bars ({})",
            backfill.min_bars, backfill.target_bars
        ));
    }
    if backfill.write_batch_size == 0 || backfill.write_batch_size > 500 {
        return Err("backfill.write_batch_size must be between 1 and 500".to_string());
    }
    if !(0..=MAX_POOL_REFRESH_DAYS).contains(&backfill.pool_refresh_days) {
        return Err(format!(
            "backfill.pool_refresh_days must be between 0 and {}",
            MAX_POOL_REFRESH_DAYS
        ));
    }

    let api = &config.geckoterminal;
    if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
        return Err(format!(
            "geckoterminal.base_url must be an http(s) URL, got '{}'",
            api.base_url
        ));
    }
    if api.max_attempts == 0 {
        return Err("geckoterminal.max_attempts must be at least 1".to_string());
    }
    if api.pools_timeout_secs == 0 || api.ohlcv_timeout_secs == 0 {
        return Err("geckoterminal timeouts must be greater than zero".to_string());
    }

    if !(config.validation.max_price_ratio > 1.0) {
        return Err("validation.max_price_ratio must be greater than 1".to_string());
    }

    let interpolation = &config.interpolation;
    if interpolation.range_spread_ratio < 0.0 || interpolation.price_spread_ratio < 0.0 {
        return Err("interpolation spread ratios cannot be negative".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.backfill.target_bars, 666);
        assert_eq!(config.backfill.min_bars, 333);
        assert_eq!(config.backfill.fetch_buffer, 10);
        assert_eq!(config.backfill.pool_refresh_days, 7);
        assert_eq!(config.backfill.write_batch_size, 500);
        assert_eq!(config.geckoterminal.max_attempts, 3);
        assert_eq!(config.geckoterminal.pools_timeout_secs, 15);
        assert_eq!(config.geckoterminal.ohlcv_timeout_secs, 60);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backfill]\ntarget_bars = 1000\n\n[interpolation]\nrange_spread_ratio = 0.02").unwrap();

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.backfill.target_bars, 1000);
        assert_eq!(config.backfill.min_bars, 333);
        assert_eq!(config.interpolation.range_spread_ratio, 0.02);
        assert_eq!(config.interpolation.price_spread_ratio, 0.001);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OHLCV_TARGET_BARS", "800"),
            ("OHLCV_MIN_BARS", " 400 "),
            ("OHLCV_DB_PATH", "/tmp/bars.db"),
            ("GECKOTERMINAL_BASE_URL", "http://localhost:9000/api/"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides_from(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.backfill.target_bars, 800);
        assert_eq!(config.backfill.min_bars, 400);
        assert_eq!(config.database.path, "/tmp/bars.db");
        assert_eq!(config.geckoterminal.base_url, "http://localhost:9000/api");
        assert_eq!(config.backfill.fetch_buffer, 10);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = Config::default();
        let err = apply_overrides_from(&mut config, |k| {
            (k == "OHLCV_FETCH_BUFFER").then(|| "ten".to_string())
        })
        .unwrap_err();
        assert!(err.contains("OHLCV_FETCH_BUFFER"));
    }

    #[test]
    fn test_validation_rejects_min_above_target() {
        let mut config = Config::default();
        config.backfill.min_bars = 700;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.backfill.write_batch_size = 501;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_out_of_range_refresh_interval_is_rejected() {
        let mut config = Config::default();
        apply_overrides_from(&mut config, |k| {
            (k == "OHLCV_POOL_REFRESH_DAYS").then(|| "1000000000000".to_string())
        })
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("pool_refresh_days"));

        config.backfill.pool_refresh_days = 36_500;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_bad_base_url_override_fails_validation() {
        let mut config = Config::default();
        apply_overrides_from(&mut config, |k| {
            (k == "GECKOTERMINAL_BASE_URL").then(|| "api.geckoterminal.com/api/v2".to_string())
        })
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("base_url"));
    }
}
