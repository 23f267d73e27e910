// Core types for the OHLCV backfill pipeline

use crate::chains::Chain;
use crate::errors::BackfillError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported bar widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
}

/// GeckoTerminal OHLCV path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Minute,
    Hour,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
        }
    }
}

impl Timeframe {
    pub fn all() -> [Timeframe; 4] {
        [
            Timeframe::Minute1,
            Timeframe::Minute15,
            Timeframe::Hour1,
            Timeframe::Hour4,
        ]
    }

    /// (granularity, aggregate) pair the upstream API expects for this timeframe
    pub fn api_params(&self) -> (Granularity, u32) {
        match self {
            Timeframe::Minute1 => (Granularity::Minute, 1),
            Timeframe::Minute15 => (Granularity::Minute, 15),
            Timeframe::Hour1 => (Granularity::Hour, 1),
            Timeframe::Hour4 => (Granularity::Hour, 4),
        }
    }

    pub fn to_seconds(&self) -> i64 {
        self.to_minutes() * 60
    }

    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute15 => 15,
            Timeframe::Hour1 => 60,
            Timeframe::Hour4 => 240,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute15 => "15m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = BackfillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Timeframe::Minute1),
            "15m" => Ok(Timeframe::Minute15),
            "1h" => Ok(Timeframe::Hour1),
            "4h" => Ok(Timeframe::Hour4),
            other => Err(BackfillError::unsupported("timeframe", other)),
        }
    }
}

/// Identity of one stored bar series
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeriesKey {
    pub token_contract: String,
    pub chain: Chain,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(token_contract: impl Into<String>, chain: Chain, timeframe: Timeframe) -> Self {
        Self {
            token_contract: token_contract.into(),
            chain,
            timeframe,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.chain, self.token_contract, self.timeframe)
    }
}

/// One bar exactly as decoded from upstream, before validation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl RawBar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// A validated (or synthesized) USD-denominated bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// True when produced by gap interpolation rather than observed upstream
    pub interpolated: bool,
}

impl Candle {
    /// High/low bracket open and close, and volume is non-negative
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.volume >= 0.0
    }
}

/// Why a raw bar was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvalidReason {
    NonPositivePrice,
    InvalidOhlcOrdering,
    ExtremePriceJump,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::NonPositivePrice => "non-positive price",
            InvalidReason::InvalidOhlcOrdering => "invalid OHLC ordering",
            InvalidReason::ExtremePriceJump => "extreme price jump",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage row for the bar table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarRow {
    pub token_contract: String,
    pub chain: Chain,
    pub timeframe: Timeframe,
    pub timestamp: i64,
    pub open_native: f64,
    pub high_native: f64,
    pub low_native: f64,
    pub close_native: f64,
    pub open_usd: f64,
    pub high_usd: f64,
    pub low_usd: f64,
    pub close_usd: f64,
    pub volume: f64,
    pub source: String,
}

/// Pool chosen to represent a token's USD price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPool {
    #[serde(rename = "pair_address")]
    pub pool_address: String,
    pub dex_id: String,
    pub quote_symbol: Option<String>,
    #[serde(rename = "last_pool_check")]
    pub last_checked_at: DateTime<Utc>,
}

impl CanonicalPool {
    /// A cached pool is served without a network call while this holds
    pub fn is_fresh(&self, now: DateTime<Utc>, refresh_days: i64) -> bool {
        let has_quote = self
            .quote_symbol
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        // a refresh interval chrono cannot represent never expires
        let within_interval = match Duration::try_days(refresh_days) {
            Some(interval) => now - self.last_checked_at <= interval,
            None => true,
        };
        has_quote && within_interval
    }
}

/// One pool returned by pool discovery
#[derive(Debug, Clone, PartialEq)]
pub struct PoolCandidate {
    pub address: String,
    pub name: String,
    pub dex_id: String,
    pub base_address: Option<String>,
    pub quote_address: Option<String>,
    pub quote_symbol: Option<String>,
    /// USD reserve; 0.0 when upstream omits it
    pub reserve_usd: f64,
}

/// Downstream position lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Dormant,
    Watchlist,
    Active,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Dormant => "dormant",
            PositionStatus::Watchlist => "watchlist",
            PositionStatus::Active => "active",
            PositionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dormant" => Ok(PositionStatus::Dormant),
            "watchlist" => Ok(PositionStatus::Watchlist),
            "active" => Ok(PositionStatus::Active),
            "closed" => Ok(PositionStatus::Closed),
            _ => Err(format!("Unknown position status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub id: i64,
    pub token_contract: String,
    pub chain: Chain,
    pub timeframe: Timeframe,
    pub status: PositionStatus,
    pub bars_count: i64,
    pub canonical_pool: Option<CanonicalPool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_lookup_table() {
        assert_eq!(Timeframe::Minute1.api_params(), (Granularity::Minute, 1));
        assert_eq!(Timeframe::Minute15.api_params(), (Granularity::Minute, 15));
        assert_eq!(Timeframe::Hour1.api_params(), (Granularity::Hour, 1));
        assert_eq!(Timeframe::Hour4.api_params(), (Granularity::Hour, 4));
        assert_eq!(Timeframe::Hour4.to_seconds(), 14_400);

        for tf in Timeframe::all() {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("5m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_pool_freshness() {
        let now = Utc::now();
        let mut pool = CanonicalPool {
            pool_address: "pool".to_string(),
            dex_id: "raydium".to_string(),
            quote_symbol: Some("SOL".to_string()),
            last_checked_at: now - Duration::days(6),
        };
        assert!(pool.is_fresh(now, 7));

        pool.last_checked_at = now - Duration::days(8);
        assert!(!pool.is_fresh(now, 7));

        pool.last_checked_at = now;
        pool.quote_symbol = None;
        assert!(!pool.is_fresh(now, 7));
    }

    #[test]
    fn test_unrepresentable_refresh_interval_never_expires() {
        let now = Utc::now();
        let pool = CanonicalPool {
            pool_address: "pool".to_string(),
            dex_id: "raydium".to_string(),
            quote_symbol: Some("SOL".to_string()),
            last_checked_at: now - Duration::days(3650),
        };
        assert!(pool.is_fresh(now, 1_000_000_000_000));
        assert!(pool.is_fresh(now, i64::MAX));
    }

    #[test]
    fn test_canonical_pool_json_shape() {
        let pool = CanonicalPool {
            pool_address: "0xpool".to_string(),
            dex_id: "uniswap_v3".to_string(),
            quote_symbol: Some("WETH".to_string()),
            last_checked_at: Utc::now(),
        };
        let value = serde_json::to_value(&pool).unwrap();
        assert_eq!(value["pair_address"], "0xpool");
        assert!(value.get("last_pool_check").is_some());
    }
}
