//! Bar count bookkeeping and the dormant -> watchlist promotion

use crate::errors::BackfillResult;
use crate::logger::{self, LogTag};
use crate::ohlcvs::database::OhlcvDatabase;
use crate::ohlcvs::types::{PositionStatus, SeriesKey};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleUpdate {
    pub bars_count: i64,
    /// Status after the update; `None` when the series has no position
    pub status: Option<PositionStatus>,
    pub promoted: bool,
}

pub struct LifecycleUpdater {
    db: Arc<OhlcvDatabase>,
    min_bars: i64,
}

impl LifecycleUpdater {
    pub fn new(db: Arc<OhlcvDatabase>, min_bars: usize) -> Self {
        Self {
            db,
            min_bars: min_bars as i64,
        }
    }

    pub fn update(&self, key: &SeriesKey) -> BackfillResult<LifecycleUpdate> {
        let bars_count = self.db.count_bars(key)?;
        let previous = self
            .db
            .get_position(&key.token_contract, key.chain)?
            .filter(|p| p.timeframe == key.timeframe)
            .map(|p| p.status);

        let target = if bars_count >= self.min_bars {
            PositionStatus::Watchlist
        } else {
            PositionStatus::Dormant
        };
        let status =
            self.db
                .update_position_lifecycle(key, bars_count, PositionStatus::Dormant, target)?;

        let promoted = previous == Some(PositionStatus::Dormant)
            && status == Some(PositionStatus::Watchlist);

        match status {
            None => logger::debug(
                LogTag::Lifecycle,
                &format!("No position for {}, {} bars stored", key, bars_count),
            ),
            Some(_) if promoted => logger::info(
                LogTag::Lifecycle,
                &format!(
                    "Position {} promoted dormant -> watchlist with {} bars",
                    key, bars_count
                ),
            ),
            Some(status) => logger::debug(
                LogTag::Lifecycle,
                &format!("Position {} stays {} with {} bars", key, status, bars_count),
            ),
        }

        Ok(LifecycleUpdate {
            bars_count,
            status,
            promoted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::Chain;
    use crate::ohlcvs::types::{BarRow, Timeframe};

    fn seed(db: &OhlcvDatabase, key: &SeriesKey, bars: i64) {
        let rows: Vec<BarRow> = (0..bars)
            .map(|i| BarRow {
                token_contract: key.token_contract.clone(),
                chain: key.chain,
                timeframe: key.timeframe,
                timestamp: i * key.timeframe.to_seconds(),
                open_native: 0.0,
                high_native: 0.0,
                low_native: 0.0,
                close_native: 0.0,
                open_usd: 1.0,
                high_usd: 1.0,
                low_usd: 1.0,
                close_usd: 1.0,
                volume: 0.0,
                source: "geckoterminal".to_string(),
            })
            .collect();
        db.upsert_batch(&rows).unwrap();
    }

    fn setup(bars: i64) -> (Arc<OhlcvDatabase>, SeriesKey) {
        let db = Arc::new(OhlcvDatabase::in_memory().unwrap());
        let key = SeriesKey::new("Token111", Chain::Solana, Timeframe::Hour1);
        db.insert_position(&key).unwrap();
        seed(&db, &key, bars);
        (db, key)
    }

    #[test]
    fn test_promotes_at_threshold() {
        let (db, key) = setup(333);
        let update = LifecycleUpdater::new(db.clone(), 333).update(&key).unwrap();
        assert_eq!(update.bars_count, 333);
        assert_eq!(update.status, Some(PositionStatus::Watchlist));
        assert!(update.promoted);

        // already on watchlist: count refreshed, no second promotion
        let update = LifecycleUpdater::new(db, 333).update(&key).unwrap();
        assert!(!update.promoted);
        assert_eq!(update.status, Some(PositionStatus::Watchlist));
    }

    #[test]
    fn test_stays_dormant_below_threshold() {
        let (db, key) = setup(332);
        let update = LifecycleUpdater::new(db.clone(), 333).update(&key).unwrap();
        assert_eq!(update.status, Some(PositionStatus::Dormant));
        assert!(!update.promoted);
        assert_eq!(
            db.get_position("Token111", Chain::Solana).unwrap().unwrap().bars_count,
            332
        );
    }

    #[test]
    fn test_missing_position_is_reported() {
        let db = Arc::new(OhlcvDatabase::in_memory().unwrap());
        let key = SeriesKey::new("Token111", Chain::Solana, Timeframe::Hour1);
        seed(&db, &key, 400);

        let update = LifecycleUpdater::new(db, 333).update(&key).unwrap();
        assert_eq!(update.bars_count, 400);
        assert_eq!(update.status, None);
        assert!(!update.promoted);
    }
}
