//! Error types for route management.

use thiserror::Error;

/// Errors that can occur while managing routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// No adapter handles the route's target type.
    #[error("unknown target type: {0}")]
    UnknownTargetType(String),

    /// The target is malformed for its adapter.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// A route could not be written to or read from the store.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No route with the given id exists.
    #[error("route not found: {0}")]
    NotFound(String),
}

/// Result type alias for route operations.
pub type RouteResult<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = RouteError::UnknownTargetType("kafka".to_string());
        assert_eq!(err.to_string(), "unknown target type: kafka");

        let err = RouteError::NotFound("0a1b2c3d4e5f".to_string());
        assert_eq!(err.to_string(), "route not found: 0a1b2c3d4e5f");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: RouteError = io.into();
        assert!(matches!(err, RouteError::Io(_)));
    }
}
