/// Upstream market data access
///
/// Structure:
/// - `client`: rate limiter, retry policy and the shared HTTP wrapper
/// - `geckoterminal`: pool discovery and OHLCV endpoints
///
/// Callers depend on [`MarketDataSource`] so the backfill pipeline can run
/// against a scripted source in tests.
pub mod client;
pub mod geckoterminal;

use crate::chains::Chain;
use crate::ohlcvs::types::{Granularity, PoolCandidate, RawBar, Timeframe};
use async_trait::async_trait;

pub use client::{HttpClient, RateLimiter, RetryPolicy};
pub use geckoterminal::GeckoTerminalClient;

/// Result of one upstream call after retries
///
/// Not-found and rate-limit exhaustion are values the caller branches on,
/// not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Data(T),
    NotFound,
    /// Still rate limited after this many attempts
    RateLimited(u32),
    Failed(String),
}

impl<T> FetchOutcome<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Data(value) => FetchOutcome::Data(f(value)),
            FetchOutcome::NotFound => FetchOutcome::NotFound,
            FetchOutcome::RateLimited(attempts) => FetchOutcome::RateLimited(attempts),
            FetchOutcome::Failed(message) => FetchOutcome::Failed(message),
        }
    }
}

/// Parameters of one windowed OHLCV request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OhlcvQuery {
    pub granularity: Granularity,
    pub aggregate: u32,
    pub limit: usize,
    /// Only bars strictly before this unix timestamp
    pub before_timestamp: Option<i64>,
}

impl OhlcvQuery {
    pub fn for_timeframe(timeframe: Timeframe, limit: usize, before_timestamp: Option<i64>) -> Self {
        let (granularity, aggregate) = timeframe.api_params();
        Self {
            granularity,
            aggregate,
            limit,
            before_timestamp,
        }
    }
}

/// Decoded bars plus the count of rows that could not be decoded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OhlcvBatch {
    pub bars: Vec<RawBar>,
    pub malformed: usize,
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Pools trading `token` on `chain`
    async fn fetch_pools(&self, chain: Chain, token: &str) -> FetchOutcome<Vec<PoolCandidate>>;

    /// Raw bars for `pool`, in whatever order upstream returns them
    async fn fetch_ohlcv(
        &self,
        chain: Chain,
        pool: &str,
        query: &OhlcvQuery,
    ) -> FetchOutcome<OhlcvBatch>;
}
