//! Backfill orchestration: pool -> fetch -> validate/repair -> persist -> lifecycle
//!
//! Every documented terminal condition comes back as a [`BackfillRunResult`];
//! `run` never returns an error.

use crate::apis::{FetchOutcome, MarketDataSource, OhlcvQuery};
use crate::chains::Chain;
use crate::config::Config;
use crate::constants::MAX_OHLCV_LIMIT;
use crate::errors::{BackfillError, BackfillResult};
use crate::logger::{self, LogTag};
use crate::ohlcvs::database::OhlcvDatabase;
use crate::ohlcvs::gaps::{detect_gaps, Gap};
use crate::ohlcvs::interpolator::GapInterpolator;
use crate::ohlcvs::lifecycle::{LifecycleUpdate, LifecycleUpdater};
use crate::ohlcvs::pools::{PoolResolution, PoolResolver};
use crate::ohlcvs::rows::RowBuilder;
use crate::ohlcvs::types::{RawBar, SeriesKey, Timeframe};
use crate::ohlcvs::validator::CandleValidator;
use crate::ohlcvs::writer::BarWriter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    TokenNotFound,
    NoData,
    NoValidRows,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::TokenNotFound => "token_not_found",
            RunStatus::NoData => "no_data",
            RunStatus::NoValidRows => "no_valid_rows",
            RunStatus::Failed => "failed",
        }
    }
}

/// Summary of one backfill run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillRunResult {
    pub token_contract: String,
    pub chain: Chain,
    pub timeframe: Timeframe,
    pub status: RunStatus,
    pub inserted_rows: usize,
    /// Terminal condition code, or the failure message for `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<String>,
    /// `[start, end]` unix seconds
    pub window: [i64; 2],
    pub fetched_bars: usize,
    pub malformed_rows: usize,
    pub interpolated: usize,
    pub dropped: usize,
    pub gaps: Vec<Gap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecycleUpdate>,
    pub duration_ms: u64,
}

impl BackfillRunResult {
    fn new(key: &SeriesKey, window: [i64; 2]) -> Self {
        Self {
            token_contract: key.token_contract.clone(),
            chain: key.chain,
            timeframe: key.timeframe,
            status: RunStatus::Completed,
            inserted_rows: 0,
            error: None,
            pool_address: None,
            window,
            fetched_bars: 0,
            malformed_rows: 0,
            interpolated: 0,
            dropped: 0,
            gaps: Vec::new(),
            lifecycle: None,
            duration_ms: 0,
        }
    }

    fn terminal(mut self, status: RunStatus) -> Self {
        self.status = status;
        self.inserted_rows = 0;
        self.error = Some(status.as_str().to_string());
        self
    }

    fn failed(mut self, message: String) -> Self {
        self.status = RunStatus::Failed;
        self.inserted_rows = 0;
        self.error = Some(message);
        self
    }

    /// False only for unexpected failures; terminal outcomes count as handled
    pub fn is_success(&self) -> bool {
        self.status != RunStatus::Failed
    }
}

/// Bar count and limit for one windowed fetch
fn fetch_limit(timeframe: Timeframe, lookback_minutes: i64, wanted: usize) -> usize {
    let bars_in_window = (lookback_minutes / timeframe.to_minutes()).max(1) as usize;
    wanted.min(bars_in_window).clamp(1, MAX_OHLCV_LIMIT)
}

/// One request never returns more than `MAX_OHLCV_LIMIT` bars, so a longer
/// lookback cannot add data
fn clamp_lookback(timeframe: Timeframe, lookback_minutes: i64) -> i64 {
    lookback_minutes.min(MAX_OHLCV_LIMIT as i64 * timeframe.to_minutes())
}

/// Sort by timestamp, keep the first bar per timestamp, and clip to the window
fn prepare_raw_bars(mut bars: Vec<RawBar>, window: [i64; 2]) -> Vec<RawBar> {
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars.retain(|b| b.timestamp >= window[0] && b.timestamp <= window[1]);
    bars
}

pub struct Backfiller {
    source: Arc<dyn MarketDataSource>,
    resolver: PoolResolver,
    interpolator: GapInterpolator,
    rows: RowBuilder,
    writer: BarWriter,
    lifecycle: LifecycleUpdater,
    target_bars: usize,
    min_bars: usize,
    fetch_buffer: usize,
}

impl Backfiller {
    pub fn new(config: &Config, db: Arc<OhlcvDatabase>, source: Arc<dyn MarketDataSource>) -> Self {
        let backfill = &config.backfill;
        Self {
            resolver: PoolResolver::new(db.clone(), source.clone(), backfill.pool_refresh_days),
            interpolator: GapInterpolator::new(
                CandleValidator::new(&config.validation),
                config.interpolation.clone(),
            ),
            rows: RowBuilder::new(backfill.source_tag.clone(), backfill.target_bars),
            writer: BarWriter::new(db.clone(), backfill.write_batch_size),
            lifecycle: LifecycleUpdater::new(db.clone(), backfill.min_bars),
            target_bars: backfill.target_bars,
            min_bars: backfill.min_bars,
            fetch_buffer: backfill.fetch_buffer,
            source,
        }
    }

    /// Default lookback covering the target plus buffer
    pub fn default_lookback_minutes(&self, timeframe: Timeframe) -> i64 {
        let bars = i64::try_from(self.target_bars.saturating_add(self.fetch_buffer))
            .unwrap_or(i64::MAX);
        timeframe.to_minutes().saturating_mul(bars)
    }

    pub async fn run(
        &self,
        token: &str,
        chain: Chain,
        timeframe: Timeframe,
        lookback_minutes: Option<i64>,
    ) -> BackfillRunResult {
        self.run_at(token, chain, timeframe, lookback_minutes, Utc::now())
            .await
    }

    /// Same as [`run`](Self::run) with an explicit clock
    pub async fn run_at(
        &self,
        token: &str,
        chain: Chain,
        timeframe: Timeframe,
        lookback_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> BackfillRunResult {
        let started = Instant::now();
        let key = SeriesKey::new(token, chain, timeframe);
        let lookback = clamp_lookback(
            timeframe,
            lookback_minutes
                .filter(|m| *m > 0)
                .unwrap_or_else(|| self.default_lookback_minutes(timeframe)),
        );
        let end = now.timestamp();
        let window = [end.saturating_sub(lookback * 60), end];

        logger::info(
            LogTag::Ohlcv,
            &format!("Backfill started for {} (lookback {}m)", key, lookback),
        );

        let result = BackfillRunResult::new(&key, window);
        let mut result = match self.execute(&key, lookback, now, result.clone()).await {
            Ok(result) => result,
            Err(e) => {
                logger::error(LogTag::Ohlcv, &format!("Backfill failed for {}: {}", key, e));
                result.failed(e.to_string())
            }
        };
        result.duration_ms = started.elapsed().as_millis() as u64;

        logger::info(
            LogTag::Ohlcv,
            &format!(
                "Backfill finished for {}: {} ({} rows, {} interpolated, {} dropped, {}ms)",
                key,
                result.status.as_str(),
                result.inserted_rows,
                result.interpolated,
                result.dropped,
                result.duration_ms
            ),
        );
        result
    }

    async fn execute(
        &self,
        key: &SeriesKey,
        lookback: i64,
        now: DateTime<Utc>,
        mut result: BackfillRunResult,
    ) -> BackfillResult<BackfillRunResult> {
        let pool = match self
            .resolver
            .resolve(key.chain, &key.token_contract, now)
            .await?
        {
            PoolResolution::Found(pool) => pool,
            PoolResolution::NotFound => return Ok(result.terminal(RunStatus::TokenNotFound)),
        };
        result.pool_address = Some(pool.pool_address.clone());

        let limit = fetch_limit(key.timeframe, lookback, self.target_bars + self.fetch_buffer);
        let query = OhlcvQuery::for_timeframe(key.timeframe, limit, Some(result.window[1]));
        let batch = match self
            .source
            .fetch_ohlcv(key.chain, &pool.pool_address, &query)
            .await
        {
            FetchOutcome::Data(batch) => batch,
            FetchOutcome::NotFound => return Ok(result.terminal(RunStatus::NoData)),
            FetchOutcome::RateLimited(attempts) => {
                return Err(BackfillError::RateLimited {
                    endpoint: "ohlcv".to_string(),
                    attempts,
                })
            }
            FetchOutcome::Failed(message) => {
                return Err(BackfillError::Upstream {
                    endpoint: "ohlcv".to_string(),
                    message,
                })
            }
        };

        result.fetched_bars = batch.bars.len();
        result.malformed_rows = batch.malformed;
        if batch.bars.is_empty() {
            return Ok(result.terminal(RunStatus::NoData));
        }

        let raw = prepare_raw_bars(batch.bars, result.window);
        let outcome = self.interpolator.process(&raw);
        result.interpolated = outcome.interpolated;
        result.dropped = outcome.dropped;

        let rows = self.rows.build(key, &outcome.candles);
        if rows.is_empty() {
            return Ok(result.terminal(RunStatus::NoValidRows));
        }
        if rows.len() < self.min_bars {
            logger::warning(
                LogTag::Ohlcv,
                &format!(
                    "Only {} usable bars for {} (minimum {})",
                    rows.len(),
                    key,
                    self.min_bars
                ),
            );
        }

        let timestamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        result.gaps = detect_gaps(&timestamps, key.timeframe);

        result.inserted_rows = self.writer.upsert(&rows);
        result.lifecycle = Some(self.lifecycle.update(key)?);

        Ok(result)
    }
}
