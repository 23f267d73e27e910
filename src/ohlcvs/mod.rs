// OHLCV Backfill Module
// Resolves the canonical pool for a token, fetches bars, validates and repairs
// the series, and persists it idempotently with lifecycle bookkeeping.

pub mod backfill;
pub mod database;
pub mod gaps;
pub mod interpolator;
pub mod lifecycle;
pub mod pools;
pub mod rows;
pub mod types;
pub mod validator;
pub mod writer;

pub use backfill::{BackfillRunResult, Backfiller, RunStatus};
pub use database::OhlcvDatabase;
pub use gaps::{detect_gaps, Gap};
pub use interpolator::{GapInterpolator, InterpolationOutcome};
pub use lifecycle::{LifecycleUpdate, LifecycleUpdater};
pub use pools::{select_canonical_pool, PoolCache, PoolResolution, PoolResolver};
pub use rows::{dedup_rows, trim_to_recent, RowBuilder};
pub use types::{
    BarRow, Candle, CanonicalPool, Granularity, InvalidReason, PoolCandidate, Position,
    PositionStatus, RawBar, SeriesKey, Timeframe,
};
pub use validator::CandleValidator;
pub use writer::BarWriter;
