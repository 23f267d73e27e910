//! Per-bar validation of upstream OHLCV data

use crate::config::ValidationConfig;
use crate::ohlcvs::types::{Candle, InvalidReason, RawBar};

#[derive(Debug, Clone)]
pub struct CandleValidator {
    max_price_ratio: f64,
}

impl CandleValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            max_price_ratio: config.max_price_ratio,
        }
    }

    /// Classify a raw bar; rules are checked in order and the first match wins
    pub fn validate(&self, raw: &RawBar) -> Result<Candle, InvalidReason> {
        let prices = [raw.open, raw.high, raw.low, raw.close];

        // NaN fails `> 0.0`, so undecodable cells land here too
        if prices.iter().any(|p| !(*p > 0.0) || !p.is_finite()) {
            return Err(InvalidReason::NonPositivePrice);
        }

        if raw.high < raw.open.max(raw.close) || raw.low > raw.open.min(raw.close) {
            return Err(InvalidReason::InvalidOhlcOrdering);
        }

        let jump = (raw.close / raw.open).max(raw.open / raw.close);
        if jump > self.max_price_ratio {
            return Err(InvalidReason::ExtremePriceJump);
        }

        let volume = if raw.volume.is_finite() {
            raw.volume.max(0.0)
        } else {
            0.0
        };

        Ok(Candle {
            timestamp: raw.timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume,
            interpolated: false,
        })
    }
}

impl Default for CandleValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}
