// Missing-bar detection over a timestamp-ordered series

use crate::ohlcvs::types::Timeframe;
use serde::Serialize;

/// Inclusive range of expected bar timestamps with no stored bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub start: i64,
    pub end: i64,
}

impl Gap {
    pub fn missing_bars(&self, timeframe: Timeframe) -> i64 {
        (self.end - self.start) / timeframe.to_seconds() + 1
    }
}

/// Find holes in ascending, de-duplicated timestamps
pub fn detect_gaps(timestamps: &[i64], timeframe: Timeframe) -> Vec<Gap> {
    let step = timeframe.to_seconds();

    timestamps
        .windows(2)
        .filter_map(|pair| {
            let expected_next = pair[0] + step;
            (pair[1] > expected_next).then(|| Gap {
                start: expected_next,
                end: pair[1] - step,
            })
        })
        .collect()
}
