//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scireview_core::auth::AuthError;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", m.as_str())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            // Unknown email and wrong password are indistinguishable to clients.
            AuthError::UserNotFound | AuthError::PasswordNotValid => {
                AppError::Unauthorized("Invalid credentials".into())
            }
            AuthError::UserNotActive => AppError::Forbidden("User is not active".into()),
            AuthError::InvalidRefreshToken => {
                AppError::Unauthorized("Invalid refresh token".into())
            }
            AuthError::Unauthorized => {
                AppError::Unauthorized("Invalid or missing bearer token".into())
            }
            AuthError::RefreshTokenNotFound => {
                AppError::Conflict("Refresh token not found".into())
            }
            AuthError::ParsingToken => AppError::Validation("Token could not be parsed".into()),
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::UserAlreadyExists => AppError::Conflict("User already exists".into()),
            AuthError::Forbidden => AppError::Forbidden("Forbidden".into()),
            AuthError::Cancelled => AppError::Unavailable("Request cancelled".into()),
            AuthError::DbInternal => AppError::Internal("db internal error".into()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Like `From<AuthError>`, but a missing user is a 404.
///
/// For routes addressing a user by id, where "not found" leaks nothing.
pub fn user_lookup_error(e: AuthError) -> AppError {
    match e {
        AuthError::UserNotFound => AppError::NotFound("User not found".into()),
        other => AppError::from(other),
    }
}
