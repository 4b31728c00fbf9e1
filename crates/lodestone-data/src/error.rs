//! Error types for the data access layer.

use thiserror::Error;

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised by the data access layer.
#[derive(Debug, Error)]
pub enum DataError {
    /// A database operation failed.
    #[error("database operation failed")]
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        #[source]
        source: sqlx::Error,
    },
    /// The requested task does not exist.
    #[error("task not found")]
    NotFound {
        /// Missing task identifier.
        task_id: i64,
    },
}

impl From<sqlx::Error> for DataError {
    fn from(source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation: "sqlite operation",
            source,
        }
    }
}
