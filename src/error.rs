// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{ai::AiError, repository::RepositoryError, runner::RunnerError};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (session owned by another candidate)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., submission already in flight)
    Conflict(String),

    // 503 Service Unavailable, the client may retry
    Retryable(String),
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
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Retryable(msg) => {
                let body = Json(json!({
                    "error": msg,
                    "retryable": true,
                }));
                return (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Runner failures keep the session intact, so collaborator and storage
/// problems surface as retryable.
impl From<RunnerError> for AppError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::NoActiveSession => {
                AppError::NotFound("No active assessment session".to_string())
            }
            RunnerError::SessionTaken => {
                AppError::Conflict("Another candidate has an assessment in progress".to_string())
            }
            RunnerError::Scoring(AiError::RateLimited) => AppError::Retryable(
                "Submission failed due to high traffic during scoring. This can be intermittent. \
                 Please wait a moment and try submitting again."
                    .to_string(),
            ),
            RunnerError::Scoring(e) => {
                tracing::warn!("Scoring failed: {}", e);
                AppError::Retryable(format!(
                    "An unexpected error occurred during submission. Details: {}",
                    e
                ))
            }
            RunnerError::Execution(e) => {
                tracing::warn!("Batch execution failed: {}", e);
                AppError::Retryable(format!("Code execution is unavailable: {}", e))
            }
            RunnerError::Persistence(e) => {
                tracing::error!("Failed to store attempt: {}", e);
                AppError::Retryable("Your answers were scored but could not be saved. Please submit again.".to_string())
            }
        }
    }
}
