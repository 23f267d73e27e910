/// Error handling for the backfill engine
///
/// Terminal outcomes of a run (token not found, no data, no valid rows) are
/// not errors; they are reported through `RunStatus`. This type covers
/// failures that interrupt an operation.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Upstream call failed after the retry budget was spent
    #[error("Upstream error ({endpoint}): {message}")]
    Upstream { endpoint: String, message: String },

    #[error("Rate limited by upstream ({endpoint}) after {attempts} attempts")]
    RateLimited { endpoint: String, attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported {kind}: {value}")]
    Unsupported { kind: &'static str, value: String },
}

impl BackfillError {
    pub fn unsupported(kind: &'static str, value: impl Into<String>) -> Self {
        BackfillError::Unsupported {
            kind,
            value: value.into(),
        }
    }

    /// Whether the next scheduled run may succeed without intervention
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackfillError::Upstream { .. } | BackfillError::RateLimited { .. }
        )
    }
}

pub type BackfillResult<T> = Result<T, BackfillError>;
