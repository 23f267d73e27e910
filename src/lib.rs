pub mod apis; // Upstream market data (GeckoTerminal)
pub mod chains;
pub mod config;
pub mod constants;
pub mod errors;
pub mod logger;
pub mod ohlcvs; // Backfill pipeline and storage
