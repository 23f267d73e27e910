//! Candle to storage-row shaping, de-duplication and trimming

use crate::constants::INTERPOLATED_SOURCE_SUFFIX;
use crate::ohlcvs::types::{BarRow, Candle, SeriesKey};
use std::collections::HashSet;

pub struct RowBuilder {
    source_tag: String,
    target_bars: usize,
}

impl RowBuilder {
    pub fn new(source_tag: impl Into<String>, target_bars: usize) -> Self {
        Self {
            source_tag: source_tag.into(),
            target_bars,
        }
    }

    /// Map candles to rows, then sort, de-duplicate and keep the most recent `target_bars`
    pub fn build(&self, key: &SeriesKey, candles: &[Candle]) -> Vec<BarRow> {
        let rows: Vec<BarRow> = candles.iter().map(|c| self.to_row(key, c)).collect();
        let rows = dedup_rows(rows);
        trim_to_recent(rows, self.target_bars)
    }

    fn to_row(&self, key: &SeriesKey, candle: &Candle) -> BarRow {
        let source = if candle.interpolated {
            format!("{}{}", self.source_tag, INTERPOLATED_SOURCE_SUFFIX)
        } else {
            self.source_tag.clone()
        };

        BarRow {
            token_contract: key.token_contract.clone(),
            chain: key.chain,
            timeframe: key.timeframe,
            timestamp: candle.timestamp,
            // Native pricing is filled in by downstream code
            open_native: 0.0,
            high_native: 0.0,
            low_native: 0.0,
            close_native: 0.0,
            open_usd: candle.open,
            high_usd: candle.high,
            low_usd: candle.low,
            close_usd: candle.close,
            volume: candle.volume,
            source,
        }
    }
}

/// Stable sort by timestamp, keeping the first row for each storage key
pub fn dedup_rows(mut rows: Vec<BarRow>) -> Vec<BarRow> {
    rows.sort_by_key(|r| r.timestamp);

    let mut seen = HashSet::new();
    rows.retain(|r| {
        seen.insert((
            r.token_contract.clone(),
            r.chain,
            r.timeframe,
            r.timestamp,
        ))
    });
    rows
}

/// Keep the newest `limit` rows of an ascending series
pub fn trim_to_recent(mut rows: Vec<BarRow>, limit: usize) -> Vec<BarRow> {
    if rows.len() > limit {
        rows.drain(..rows.len() - limit);
    }
    rows
}
