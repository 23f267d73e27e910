// SQLite storage for bar series, positions and the canonical pool cache

use crate::chains::Chain;
use crate::errors::BackfillResult;
use crate::logger::{self, LogTag};
use crate::ohlcvs::gaps::{detect_gaps, Gap};
use crate::ohlcvs::types::{
    BarRow, CanonicalPool, Position, PositionStatus, SeriesKey, Timeframe,
};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

const CANONICAL_POOL_KEY: &str = "canonical_pool";

const SCHEMA: &str = r#"
-- Bar series, one row per (token, chain, timeframe, timestamp)
CREATE TABLE IF NOT EXISTS ohlcv_bars (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_contract TEXT NOT NULL,
    chain TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    open_native REAL NOT NULL DEFAULT 0.0,
    high_native REAL NOT NULL DEFAULT 0.0,
    low_native REAL NOT NULL DEFAULT 0.0,
    close_native REAL NOT NULL DEFAULT 0.0,
    open_usd REAL NOT NULL,
    high_usd REAL NOT NULL,
    low_usd REAL NOT NULL,
    close_usd REAL NOT NULL,
    volume REAL NOT NULL DEFAULT 0.0,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(token_contract, chain, timeframe, timestamp)
);
CREATE INDEX IF NOT EXISTS idx_bars_series
    ON ohlcv_bars(token_contract, chain, timeframe, timestamp DESC);

-- Downstream positions; metadata holds the canonical pool as JSON
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_contract TEXT NOT NULL,
    chain TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'dormant',
    bars_count INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(token_contract, chain)
);
CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status);
"#;

const UPSERT_BAR: &str = "INSERT INTO ohlcv_bars (
        token_contract, chain, timeframe, timestamp,
        open_native, high_native, low_native, close_native,
        open_usd, high_usd, low_usd, close_usd, volume, source
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
    ON CONFLICT(token_contract, chain, timeframe, timestamp) DO UPDATE SET
        open_native = excluded.open_native,
        high_native = excluded.high_native,
        low_native = excluded.low_native,
        close_native = excluded.close_native,
        open_usd = excluded.open_usd,
        high_usd = excluded.high_usd,
        low_usd = excluded.low_usd,
        close_usd = excluded.close_usd,
        volume = excluded.volume,
        source = excluded.source,
        updated_at = CURRENT_TIMESTAMP";

pub struct OhlcvDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl OhlcvDatabase {
    /// Open (or create) the database file and its tables
    pub fn new<P: AsRef<Path>>(path: P) -> BackfillResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self::from_connection(conn)?;
        logger::debug(
            LogTag::Database,
            &format!("Opened OHLCV database at {}", path.display()),
        );
        Ok(db)
    }

    pub fn in_memory() -> BackfillResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> BackfillResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // ==================== Bar Storage ====================

    /// Upsert one batch inside a single transaction
    ///
    /// Any failing row rolls back the whole batch.
    pub fn upsert_batch(&self, rows: &[BarRow]) -> BackfillResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(UPSERT_BAR)?;
            for row in rows {
                written += stmt.execute(params![
                    row.token_contract,
                    row.chain.as_str(),
                    row.timeframe.as_str(),
                    row.timestamp,
                    row.open_native,
                    row.high_native,
                    row.low_native,
                    row.close_native,
                    row.open_usd,
                    row.high_usd,
                    row.low_usd,
                    row.close_usd,
                    row.volume,
                    row.source,
                ])?;
            }
        }
        tx.commit()?;

        Ok(written)
    }

    pub fn count_bars(&self, key: &SeriesKey) -> BackfillResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM ohlcv_bars
             WHERE token_contract = ?1 AND chain = ?2 AND timeframe = ?3",
            params![key.token_contract, key.chain.as_str(), key.timeframe.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Most recent `limit` bars of a series, oldest first
    pub fn get_bars(&self, key: &SeriesKey, limit: usize) -> BackfillResult<Vec<BarRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, open_native, high_native, low_native, close_native,
                    open_usd, high_usd, low_usd, close_usd, volume, source
             FROM ohlcv_bars
             WHERE token_contract = ?1 AND chain = ?2 AND timeframe = ?3
             ORDER BY timestamp DESC
             LIMIT ?4",
        )?;

        let mut rows = stmt
            .query_map(
                params![
                    key.token_contract,
                    key.chain.as_str(),
                    key.timeframe.as_str(),
                    limit as i64
                ],
                |row| {
                    Ok(BarRow {
                        token_contract: key.token_contract.clone(),
                        chain: key.chain,
                        timeframe: key.timeframe,
                        timestamp: row.get(0)?,
                        open_native: row.get(1)?,
                        high_native: row.get(2)?,
                        low_native: row.get(3)?,
                        close_native: row.get(4)?,
                        open_usd: row.get(5)?,
                        high_usd: row.get(6)?,
                        low_usd: row.get(7)?,
                        close_usd: row.get(8)?,
                        volume: row.get(9)?,
                        source: row.get(10)?,
                    })
                },
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.reverse();
        Ok(rows)
    }

    /// Missing-bar ranges over the whole stored series
    pub fn find_gaps(&self, key: &SeriesKey) -> BackfillResult<Vec<Gap>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp FROM ohlcv_bars
             WHERE token_contract = ?1 AND chain = ?2 AND timeframe = ?3
             ORDER BY timestamp ASC",
        )?;
        let timestamps = stmt
            .query_map(
                params![key.token_contract, key.chain.as_str(), key.timeframe.as_str()],
                |row| row.get::<_, i64>(0),
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(detect_gaps(&timestamps, key.timeframe))
    }

    // ==================== Positions ====================

    /// Register a dormant position; an existing one for the token is left untouched
    pub fn insert_position(&self, key: &SeriesKey) -> BackfillResult<Position> {
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO positions (token_contract, chain, timeframe, status)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(token_contract, chain) DO NOTHING",
                params![
                    key.token_contract,
                    key.chain.as_str(),
                    key.timeframe.as_str(),
                    PositionStatus::Dormant.as_str()
                ],
            )?;
        }

        self.get_position(&key.token_contract, key.chain)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows.into())
    }

    pub fn get_position(&self, token_contract: &str, chain: Chain) -> BackfillResult<Option<Position>> {
        let conn = self.conn.lock();
        let position = conn
            .query_row(
                "SELECT id, token_contract, chain, timeframe, status, bars_count, metadata
                 FROM positions
                 WHERE token_contract = ?1 AND chain = ?2",
                params![token_contract, chain.as_str()],
                row_to_position,
            )
            .optional()?;
        Ok(position)
    }

    /// Write a fresh bar count and, if the status is still `from`, move it to `to`
    ///
    /// Returns the status stored after the update, or `None` when no position
    /// exists for the series.
    pub fn update_position_lifecycle(
        &self,
        key: &SeriesKey,
        bars_count: i64,
        from: PositionStatus,
        to: PositionStatus,
    ) -> BackfillResult<Option<PositionStatus>> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE positions
             SET bars_count = ?1,
                 status = CASE WHEN status = ?2 THEN ?3 ELSE status END,
                 updated_at = CURRENT_TIMESTAMP
             WHERE token_contract = ?4 AND chain = ?5 AND timeframe = ?6",
            params![
                bars_count,
                from.as_str(),
                to.as_str(),
                key.token_contract,
                key.chain.as_str(),
                key.timeframe.as_str()
            ],
        )?;

        if updated == 0 {
            return Ok(None);
        }

        let status: String = conn.query_row(
            "SELECT status FROM positions
             WHERE token_contract = ?1 AND chain = ?2 AND timeframe = ?3",
            params![key.token_contract, key.chain.as_str(), key.timeframe.as_str()],
            |row| row.get(0),
        )?;
        Ok(Some(parse_text_column(4, &status)?))
    }

    // ==================== Canonical Pool Cache ====================

    pub fn load_canonical_pool(
        &self,
        token_contract: &str,
        chain: Chain,
    ) -> BackfillResult<Option<CanonicalPool>> {
        let conn = self.conn.lock();
        let metadata: Option<String> = conn
            .query_row(
                "SELECT metadata FROM positions WHERE token_contract = ?1 AND chain = ?2",
                params![token_contract, chain.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(metadata.and_then(|text| canonical_pool_from_metadata(&text)))
    }

    /// Read-modify-write of the `canonical_pool` key, preserving other metadata
    ///
    /// Returns false when no position row exists to hold the pool.
    pub fn save_canonical_pool(
        &self,
        token_contract: &str,
        chain: Chain,
        pool: &CanonicalPool,
    ) -> BackfillResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let metadata: Option<String> = tx
            .query_row(
                "SELECT metadata FROM positions WHERE token_contract = ?1 AND chain = ?2",
                params![token_contract, chain.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(metadata) = metadata else {
            return Ok(false);
        };

        let mut object = match serde_json::from_str::<Value>(&metadata) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        object.insert(CANONICAL_POOL_KEY.to_string(), serde_json::to_value(pool)?);

        tx.execute(
            "UPDATE positions SET metadata = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE token_contract = ?2 AND chain = ?3",
            params![Value::Object(object).to_string(), token_contract, chain.as_str()],
        )?;
        tx.commit()?;

        Ok(true)
    }
}

fn canonical_pool_from_metadata(text: &str) -> Option<CanonicalPool> {
    let value: Value = serde_json::from_str(text).ok()?;
    let pool = value.get(CANONICAL_POOL_KEY)?.clone();
    match serde_json::from_value(pool) {
        Ok(pool) => Some(pool),
        Err(e) => {
            logger::debug(
                LogTag::Database,
                &format!("Ignoring malformed canonical_pool metadata: {}", e),
            );
            None
        }
    }
}

fn parse_text_column<T>(index: usize, text: &str) -> SqliteResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, e.to_string().into())
    })
}

fn row_to_position(row: &Row) -> SqliteResult<Position> {
    let chain: String = row.get(2)?;
    let timeframe: String = row.get(3)?;
    let status: String = row.get(4)?;
    let metadata: String = row.get(6)?;

    Ok(Position {
        id: row.get(0)?,
        token_contract: row.get(1)?,
        chain: parse_text_column::<Chain>(2, &chain)?,
        timeframe: parse_text_column::<Timeframe>(3, &timeframe)?,
        status: parse_text_column::<PositionStatus>(4, &status)?,
        bars_count: row.get(5)?,
        canonical_pool: canonical_pool_from_metadata(&metadata),
    })
}
