//! Error types with Axum response mapping.
//!
//! `StoreError` is what session and profile backends return. It never
//! reaches a handler directly: the session manager and the profile call
//! sites convert it into `AppError::StoreUnavailable`, logging the raw
//! cause on the way.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failure talking to a backing store (session adapter or profile store).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which half of a login check failed. Both map to the same status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UserNotFound,
    PasswordIncorrect,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("No active session.")]
    NoActiveSession,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Session store unavailable")]
    StoreUnavailable(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid credentials")]
    InvalidCredential(CredentialFailure),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store operation failed");
        AppError::StoreUnavailable(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::NoActiveSession => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body returned to the caller. Backend details stay in the logs.
    pub fn body(&self) -> serde_json::Value {
        match self {
            AppError::InvalidCredential(CredentialFailure::UserNotFound) => {
                json!({"error": "Invalid credentials: user not found"})
            }
            AppError::InvalidCredential(CredentialFailure::PasswordIncorrect) => {
                json!({"error": "Invalid credentials: password incorrect"})
            }
            AppError::StoreUnavailable(_) => json!({"error": "Session store unavailable"}),
            AppError::Internal(_) => json!({"error": "Internal server error"}),
            other => json!({"error": other.to_string()}),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), axum::Json(self.body())).into_response()
    }
}
