//! API error types mapped to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Service-layer error kinds, mapped to HTTP statuses at the boundary.
///
/// Crypto and database details never cross the boundary; clients see a
/// generic internal error for those.
#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    /// Bearer credential missing or unusable; `expired` selects the
    /// TOKEN_EXPIRED sub-code so clients know to attempt a refresh.
    Unauthenticated { expired: bool },
    InvalidCredentials,
    Forbidden,
    NotFound,
    Conflict(String),
    RateLimited,
    Crypto(keyhaven_core::CryptoError),
    Database(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(fields) => write!(f, "Validation failed ({} fields)", fields.len()),
            Self::Unauthenticated { expired: true } => write!(f, "Access token expired"),
            Self::Unauthenticated { expired: false } => write!(f, "Unauthenticated"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::Forbidden => write!(f, "Forbidden"),
            Self::NotFound => write!(f, "Not found"),
            Self::Conflict(m) => write!(f, "Conflict: {}", m),
            Self::RateLimited => write!(f, "Rate limited"),
            Self::Crypto(e) => write!(f, "Crypto error: {}", e),
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "Validation failed", "details": fields }),
            ),
            Self::Unauthenticated { expired } => {
                let code = if *expired { "TOKEN_EXPIRED" } else { "TOKEN_INVALID" };
                (
                    StatusCode::UNAUTHORIZED,
                    serde_json::json!({ "error": "Unauthenticated", "code": code }),
                )
            }
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "Invalid email or password" }),
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": "Forbidden" }),
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": "Not found" }),
            ),
            Self::Conflict(message) => (
                StatusCode::CONFLICT,
                serde_json::json!({ "error": message }),
            ),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                serde_json::json!({ "error": "Too many requests, try again later" }),
            ),
            Self::Crypto(e) => {
                tracing::error!("crypto failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal server error" }),
                )
            }
            Self::Database(e) => {
                tracing::error!("database failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal server error" }),
                )
            }
            Self::Internal(e) => {
                tracing::error!("internal failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict("Resource already exists".to_string())
            }
            _ => Self::Database(e.to_string()),
        }
    }
}

impl From<keyhaven_core::CryptoError> for ApiError {
    fn from(e: keyhaven_core::CryptoError) -> Self {
        Self::Crypto(e)
    }
}
