//! Error types for download history operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for history store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// The file is not a database or the schema is damaged.
    Corrupt,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Filesystem or transport IO failure.
    Io,
    /// Unclassified database failure.
    Other,
}

impl StoreErrorKind {
    /// Classifies a sqlx error.
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::Corrupt => "corrupt",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::Io => "io",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreErrorKind {
    let code = database_error.code();
    // SQLITE_BUSY = 5, SQLITE_LOCKED = 6, SQLITE_CORRUPT = 11, SQLITE_NOTADB = 26
    match code.as_deref() {
        Some("5" | "6" | "SQLITE_BUSY" | "SQLITE_LOCKED") => return StoreErrorKind::BusyOrLocked,
        Some("11" | "26" | "SQLITE_CORRUPT" | "SQLITE_NOTADB") => return StoreErrorKind::Corrupt,
        _ => {}
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database is busy") {
        StoreErrorKind::BusyOrLocked
    } else if message.contains("not a database") || message.contains("malformed") {
        StoreErrorKind::Corrupt
    } else {
        StoreErrorKind::Other
    }
}

/// Errors surfaced by a history store.
#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    /// The underlying storage could not be read or written.
    #[error("history store unavailable during {operation} ({kind}): {message}")]
    StoreUnavailable {
        /// Which store operation failed.
        operation: &'static str,
        /// Typed classification of the failure.
        kind: StoreErrorKind,
        /// Human-readable database error text.
        message: String,
    },
}

impl HistoryError {
    /// Wraps a sqlx error raised by `operation`.
    #[must_use]
    pub fn unavailable(operation: &'static str, error: &sqlx::Error) -> Self {
        Self::StoreUnavailable {
            operation,
            kind: StoreErrorKind::from_sqlx(error),
            message: error.to_string(),
        }
    }

    /// Returns the failure classification.
    #[must_use]
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::StoreUnavailable { kind, .. } => *kind,
        }
    }
}
