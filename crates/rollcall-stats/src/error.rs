//! Error types for the statistics engine.
//!
//! An empty scope is a result state, not an error: see
//! [`ResolvedScope::is_empty`](crate::ResolvedScope::is_empty). Everything in
//! [`StatsError`] means the caller did not get an answer.

use thiserror::Error;

/// Statistics engine errors.
#[derive(Error, Debug)]
pub enum StatsError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database locked error (retryable)
    #[error("database is locked (retry {retry_count}/{max_retries}): {message}")]
    DatabaseLocked {
        /// Retry attempt number
        retry_count: u32,
        /// Maximum retries allowed
        max_retries: u32,
        /// Human-readable message
        message: String,
    },

    /// Migration error
    #[error("migration error: {0}")]
    Migration(String),

    /// Query error (connection lock poisoned, unexpected row shape)
    #[error("query error: {0}")]
    Query(String),

    /// A filter or scope argument was rejected before touching the store
    #[error("malformed input for {field}: {message}")]
    MalformedInput {
        /// Name of the offending argument
        field: &'static str,
        /// What was wrong with it
        message: String,
    },
}

impl StatsError {
    /// Create a MalformedInput error.
    pub fn malformed(field: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            field,
            message: message.into(),
        }
    }

    /// Check if this error is retryable (e.g., database locked).
    pub fn is_retryable(&self) -> bool {
        is_database_locked_error(self)
    }

    /// Check if the store could not be read at all.
    ///
    /// UIs render this as an error state, distinct from an empty result.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            StatsError::Database(_)
                | StatsError::DatabaseLocked { .. }
                | StatsError::Migration(_)
                | StatsError::Query(_)
        )
    }

    /// Create a user-friendly message for this error.
    pub fn friendly_message(&self) -> String {
        match self {
            StatsError::DatabaseLocked {
                retry_count,
                max_retries,
                ..
            } => format!(
                "Attendance database is busy (attempt {}/{}). Try again shortly.",
                retry_count, max_retries
            ),
            StatsError::Database(e) => {
                let msg = e.to_string().to_lowercase();
                if msg.contains("locked") || msg.contains("busy") {
                    "Attendance database is temporarily locked. Please try again.".to_string()
                } else if msg.contains("unable to open") {
                    "Attendance database could not be opened.".to_string()
                } else {
                    format!("Attendance database error: {}", e)
                }
            }
            StatsError::MalformedInput { field, message } => {
                format!("Invalid {}: {}", field, message)
            }
            _ => format!("Error: {}", self),
        }
    }
}

/// Check if a StatsError indicates a database lock.
pub fn is_database_locked_error(error: &StatsError) -> bool {
    match error {
        StatsError::DatabaseLocked { .. } => true,
        StatsError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
            e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
        }
        _ => false,
    }
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn busy() -> StatsError {
        StatsError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        ))
    }

    #[test]
    fn test_busy_is_retryable() {
        let err = busy();
        assert!(err.is_retryable());
        assert!(err.is_store_unavailable());
        assert!(err.friendly_message().contains("temporarily locked"));
    }

    #[test]
    fn test_malformed_input_is_not_store_failure() {
        let err = StatsError::malformed("academic_year", "expected YYYY-YYYY");
        assert!(!err.is_retryable());
        assert!(!err.is_store_unavailable());
        assert_eq!(
            err.to_string(),
            "malformed input for academic_year: expected YYYY-YYYY"
        );
        assert_eq!(err.friendly_message(), "Invalid academic_year: expected YYYY-YYYY");
    }

    #[test]
    fn test_query_error_is_store_failure() {
        let err = StatsError::Query("failed to acquire lock".into());
        assert!(err.is_store_unavailable());
        assert!(!err.is_retryable());
    }
}
