// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
///
/// Every gate rejection (`NotFound` through `SessionMissing`) is raised before
/// any mutation, so none of them ever leaves a partial commit behind.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable: persistence I/O failed, retry is safe
    StoreFailure(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found (paper, question or user)
    NotFound(String),

    // 403 Forbidden: caller is not in the paper's audience
    NotEligible(String),

    // 410 Gone: paper deadline has passed
    Expired(String),

    // 409 Conflict: a record already exists for the current publish cycle
    AlreadyCompleted(String),

    // 409 Conflict: no live attempt session to submit against
    SessionMissing(String),
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "internal",
            AppError::StoreFailure(_) => "store_failure",
            AppError::BadRequest(_) => "bad_request",
            AppError::AuthError(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::NotEligible(_) => "not_eligible",
            AppError::Expired(_) => "expired",
            AppError::AlreadyCompleted(_) => "already_completed",
            AppError::SessionMissing(_) => "session_missing",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotEligible(_) => StatusCode::FORBIDDEN,
            AppError::Expired(_) => StatusCode::GONE,
            AppError::AlreadyCompleted(_) | AppError::SessionMissing(_) => StatusCode::CONFLICT,
        }
    }

    /// Only store failures are worth retrying; every other kind is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreFailure(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let retryable = self.is_retryable();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::StoreFailure(msg) => {
                tracing::error!("Store failure: {}", msg);
                "Storage temporarily unavailable, please retry".to_string()
            }
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::NotEligible(msg)
            | AppError::Expired(msg)
            | AppError::AlreadyCompleted(msg)
            | AppError::SessionMissing(msg) => msg,
        };
        let body = Json(json!({
            "error": error_message,
            "code": code,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::StoreFailure`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StoreFailure(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
