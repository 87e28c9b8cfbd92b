// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
///
/// The quiz-specific variants stay distinguishable all the way to the client
/// (through `code`) so a presentation layer can tell "out of attempts" apart
/// from "not open yet".
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Attempt limit exceeded: {used} of {max} attempts already submitted")]
    AttemptLimitExceeded { used: i64, max: i32 },

    #[error("Quiz is not open until {0}")]
    QuizNotYetOpen(DateTime<Utc>),

    #[error("Quiz closed at {0}")]
    QuizClosed(DateTime<Utc>),

    #[error("Attempt {0} has already been submitted")]
    AlreadySubmitted(i64),

    #[error("Attempt {0} ran past its time limit")]
    AttemptExpired(i64),

    #[error("Invalid quiz configuration: {0}")]
    InvalidConfiguration(String),

    // 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    // 401 Unauthorized
    #[error("Unauthorized: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // 409 Conflict (e.g., concurrent serializable transactions)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // 500 Internal Server Error
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AttemptLimitExceeded { .. } => "ATTEMPT_LIMIT_EXCEEDED",
            AppError::QuizNotYetOpen(_) => "QUIZ_NOT_YET_OPEN",
            AppError::QuizClosed(_) => "QUIZ_CLOSED",
            AppError::AlreadySubmitted(_) => "ALREADY_SUBMITTED",
            AppError::AttemptExpired(_) => "ATTEMPT_EXPIRED",
            AppError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::AuthError(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AttemptLimitExceeded { .. }
            | AppError::QuizNotYetOpen(_)
            | AppError::QuizClosed(_)
            | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::AlreadySubmitted(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::AttemptExpired(_) => StatusCode::GONE,
            AppError::InvalidConfiguration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::DatabaseError(msg) | AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": error_message,
            "code": self.error_code(),
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError`.
/// Serialization failures (SQLSTATE 40001) become `Conflict` so the caller can
/// retry the whole request; everything else is an infrastructure error.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("40001") {
                return AppError::Conflict(
                    "Concurrent update of the same attempts, please retry".to_string(),
                );
            }
        }
        AppError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
