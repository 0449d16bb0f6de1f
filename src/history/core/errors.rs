//! Error types for the chat history subsystem.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Chat history error type.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// An insert collided with an existing conversation or message id.
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    /// A referenced conversation or message does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// `SQLite` storage error, surfaced verbatim.
    #[error("persistence failure: {0}")]
    Persistence(rusqlite::Error),
    /// Malformed identifiers or missing required fields.
    #[error("validation failure: {0}")]
    Validation(String),
    /// A parent chain loops back on itself.
    #[error("corrupt history in conversation {conversation_id}: cycle at message {message_id}")]
    CorruptHistory {
        /// Conversation holding the cycle.
        conversation_id: String,
        /// First message seen twice during the walk.
        message_id: String,
    },
    /// The store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for HistoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == ErrorCode::ConstraintViolation
                    && matches!(
                        code.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                Self::DuplicateId(
                    message
                        .clone()
                        .unwrap_or_else(|| "unique constraint violated".to_string()),
                )
            }
            _ => Self::Persistence(err),
        }
    }
}

impl HistoryError {
    /// Whether this error reports a uniqueness collision.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateId(_))
    }

    /// Whether this error reports a missing conversation or message.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience result alias for chat history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_maps_to_duplicate() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT NOT NULL UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .map_err(HistoryError::from)
            .unwrap_err();
        assert!(err.is_duplicate(), "got {err:?}");
    }

    #[test]
    fn test_other_sqlite_errors_stay_persistence() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn
            .execute("SELECT * FROM missing_table", [])
            .map_err(HistoryError::from)
            .unwrap_err();
        assert!(matches!(err, HistoryError::Persistence(_)));
    }
}
