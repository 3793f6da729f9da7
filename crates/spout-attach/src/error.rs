//! Attachment error types.

use thiserror::Error;

/// Errors raised by the attach manager and container runtimes.
#[derive(Debug, Error)]
pub enum AttachError {
    /// The container is not running or not attached.
    #[error("container not found: {0}")]
    NotFound(String),

    /// The container runtime could not be reached.
    #[error("failed to connect to container runtime: {0}")]
    ConnectionFailed(String),

    /// The container runtime rejected or failed a request.
    #[error("container runtime error: {0}")]
    Runtime(String),

    /// The manager has been shut down and takes no new listeners.
    #[error("attach manager is shut down")]
    ShutDown,
}

/// Result type for attach operations.
pub type AttachResult<T> = std::result::Result<T, AttachError>;
