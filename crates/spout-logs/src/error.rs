//! Error types for the log data model.

use thiserror::Error;

/// Errors raised while parsing log model values.
#[derive(Debug, Error)]
pub enum LogsError {
    /// A stream type other than `stdout` or `stderr` was given.
    #[error("invalid stream type: {0}")]
    InvalidStreamType(String),

    /// A source predicate other than `id`, `name` or `filter` was given.
    #[error("invalid source predicate: {0}")]
    InvalidPredicate(String),
}

/// Result type alias for log model operations.
pub type Result<T> = std::result::Result<T, LogsError>;
