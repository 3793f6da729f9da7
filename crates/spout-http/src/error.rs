//! Error types for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use spout_attach::AttachError;
use spout_logs::LogsError;
use spout_routes::RouteError;
use thiserror::Error;

/// Result type alias for HTTP handlers.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors returned by the HTTP surface.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// Resource not found.
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// The daemon is shutting down.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Self::NotFound(_, _) => (StatusCode::NOT_FOUND, "not_found"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Self::BindFailed(_, _) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            r#"{"error":"internal_error","message":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}

impl From<LogsError> for HttpError {
    fn from(err: LogsError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<AttachError> for HttpError {
    fn from(err: AttachError) -> Self {
        match err {
            AttachError::NotFound(id) => Self::NotFound("container".to_string(), id),
            shut @ AttachError::ShutDown => Self::Unavailable(shut.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<RouteError> for HttpError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::UnknownTargetType(_) | RouteError::InvalidTarget(_) => {
                Self::BadRequest(err.to_string())
            }
            RouteError::NotFound(id) => Self::NotFound("route".to_string(), id),
            other => Self::Internal(other.to_string()),
        }
    }
}
