//! Batched idempotent persistence of bar rows

use crate::logger::{self, LogTag};
use crate::ohlcvs::database::OhlcvDatabase;
use crate::ohlcvs::types::BarRow;
use std::sync::Arc;

pub struct BarWriter {
    db: Arc<OhlcvDatabase>,
    batch_size: usize,
}

impl BarWriter {
    pub fn new(db: Arc<OhlcvDatabase>, batch_size: usize) -> Self {
        Self {
            db,
            batch_size: batch_size.max(1),
        }
    }

    /// Upsert rows batch by batch and return how many were written
    ///
    /// A failed batch is rolled back and skipped; later batches still run.
    pub fn upsert(&self, rows: &[BarRow]) -> usize {
        let mut written = 0;
        let batches = rows.chunks(self.batch_size);
        let total = batches.len();

        for (index, batch) in batches.enumerate() {
            match self.db.upsert_batch(batch) {
                Ok(count) => written += count,
                Err(e) => logger::error(
                    LogTag::Database,
                    &format!(
                        "Batch {}/{} ({} rows, first ts {}) failed and was skipped: {}",
                        index + 1,
                        total,
                        batch.len(),
                        batch[0].timestamp,
                        e
                    ),
                ),
            }
        }

        logger::debug(
            LogTag::Database,
            &format!("Upserted {}/{} rows in {} batches", written, rows.len(), total),
        );
        written
    }
}
