/// Configuration schemas - every section defined once with its defaults
use crate::config_struct;

// ============================================================================
// BACKFILL
// ============================================================================

config_struct! {
    /// Bar targets and pool cache policy for a backfill run
    pub struct BackfillConfig {
        /// Bars kept per (token, chain, timeframe) series
        target_bars: usize = 666,
        /// Bars required before a dormant position is promoted to watchlist
        min_bars: usize = 333,
        /// Extra bars requested on top of the target
        fetch_buffer: usize = 10,
        /// Cached canonical pools older than this are refreshed
        pool_refresh_days: i64 = 7,
        /// Rows per upsert transaction
        write_batch_size: usize = 500,
        /// Source tag written with every upstream bar
        source_tag: String = "geckoterminal".to_string(),
    }
}

// ============================================================================
// UPSTREAM API
// ============================================================================

config_struct! {
    /// GeckoTerminal client settings
    pub struct GeckoTerminalConfig {
        base_url: String = "https://api.geckoterminal.com/api/v2".to_string(),
        pools_timeout_secs: u64 = 15,
        ohlcv_timeout_secs: u64 = 60,
        /// Client-side spacing of calls; 0 disables it
        rate_limit_per_minute: usize = 30,
        max_attempts: u32 = 3,
        /// Length of one backoff unit; 429 waits 2^attempt * 2 units, other failures attempt + 1
        backoff_unit_ms: u64 = 1000,
    }
}

// ============================================================================
// VALIDATION & REPAIR
// ============================================================================

config_struct! {
    /// Candle validation thresholds
    pub struct ValidationConfig {
        /// Candles whose open/close ratio exceeds this are rejected
        max_price_ratio: f64 = 100.0,
    }
}

config_struct! {
    /// Gap interpolation parameters
    pub struct InterpolationConfig {
        /// Runs of invalid bars shorter than this are interpolated, longer ones dropped
        max_interpolated_run: usize = 3,
        /// Spread as a share of the |nextOpen - prevClose| range
        range_spread_ratio: f64 = 0.01,
        /// Minimum spread as a share of the interpolated price
        price_spread_ratio: f64 = 0.001,
    }
}

// ============================================================================
// STORAGE
// ============================================================================

config_struct! {
    pub struct DatabaseConfig {
        path: String = "data/ohlcv.db".to_string(),
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Root configuration, built once at startup and passed to each component
    pub struct Config {
        backfill: BackfillConfig = BackfillConfig::default(),
        geckoterminal: GeckoTerminalConfig = GeckoTerminalConfig::default(),
        validation: ValidationConfig = ValidationConfig::default(),
        interpolation: InterpolationConfig = InterpolationConfig::default(),
        database: DatabaseConfig = DatabaseConfig::default(),
    }
}
