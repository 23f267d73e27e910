//! Repair of short invalid runs inside an ordered bar series

use crate::config::InterpolationConfig;
use crate::logger::{self, LogTag};
use crate::ohlcvs::types::{Candle, InvalidReason, RawBar};
use crate::ohlcvs::validator::CandleValidator;

/// Result of one interpolation pass
#[derive(Debug, Clone, Default)]
pub struct InterpolationOutcome {
    pub candles: Vec<Candle>,
    pub interpolated: usize,
    pub dropped: usize,
}

pub struct GapInterpolator {
    validator: CandleValidator,
    config: InterpolationConfig,
}

impl GapInterpolator {
    pub fn new(validator: CandleValidator, config: InterpolationConfig) -> Self {
        Self { validator, config }
    }

    /// Validate and repair bars that are already sorted by ascending timestamp
    ///
    /// Valid bars pass through unchanged. A maximal run of invalid bars is
    /// rebuilt only when a valid bar bounds it on both sides and it is shorter
    /// than `max_interpolated_run`; any other run is dropped.
    pub fn process(&self, bars: &[RawBar]) -> InterpolationOutcome {
        let classified: Vec<Result<Candle, InvalidReason>> =
            bars.iter().map(|bar| self.validator.validate(bar)).collect();

        let mut outcome = InterpolationOutcome {
            candles: Vec::with_capacity(bars.len()),
            ..Default::default()
        };
        let mut last_valid: Option<Candle> = None;
        let mut i = 0;

        while i < classified.len() {
            let first_reason = match classified[i] {
                Ok(candle) => {
                    outcome.candles.push(candle);
                    last_valid = Some(candle);
                    i += 1;
                    continue;
                }
                Err(reason) => reason,
            };

            let run_start = i;
            while i < classified.len() && classified[i].is_err() {
                i += 1;
            }
            let run = &bars[run_start..i];
            let next_valid = classified.get(i).and_then(|r| r.as_ref().ok().copied());

            match (last_valid, next_valid) {
                (Some(prev), Some(next)) if run.len() < self.config.max_interpolated_run => {
                    for bar in run {
                        outcome
                            .candles
                            .push(self.synthesize(&prev, &next, bar.timestamp));
                    }
                    outcome.interpolated += run.len();
                }
                _ => {
                    logger::warning(
                        LogTag::Ohlcv,
                        &format!(
                            "Dropping {} invalid bar(s) starting at {} (first reason: {})",
                            run.len(),
                            run[0].timestamp,
                            first_reason
                        ),
                    );
                    outcome.dropped += run.len();
                }
            }
        }

        outcome
    }

    /// Linear interpolation between the previous close and the next open
    fn synthesize(&self, prev: &Candle, next: &Candle, timestamp: i64) -> Candle {
        let span = (next.timestamp - prev.timestamp) as f64;
        let t = if span > 0.0 {
            (timestamp - prev.timestamp) as f64 / span
        } else {
            0.5
        };

        let range = next.open - prev.close;
        let price = prev.close + range * t;
        let spread = (self.config.range_spread_ratio * range.abs())
            .max(self.config.price_spread_ratio * price);

        // open == close == price, so widening against price keeps the invariant
        let high = (price + spread).max(price);
        let low = (price - spread).max(0.0).min(price);

        Candle {
            timestamp,
            open: price,
            high,
            low,
            close: price,
            volume: 0.0,
            interpolated: true,
        }
    }
}

impl Default for GapInterpolator {
    fn default() -> Self {
        Self::new(CandleValidator::default(), InterpolationConfig::default())
    }
}
