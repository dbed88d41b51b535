//! Authentication and session lifecycle.
//!
//! Provides password hashing, JWT management, bearer verification and the
//! login / rotate / logout protocols, shared by `scireview_api` and
//! `scireview_cli`.

pub mod bearer;
pub mod jwt;
pub mod password;
pub mod service;

use thiserror::Error;

pub use bearer::authenticate;
pub use service::{AuthService, cancellable, with_deadline};

/// Authentication errors.
///
/// Store failures never surface with their cause: they are logged where they
/// happen and reported as [`AuthError::DbInternal`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,

    #[error("user not active")]
    UserNotActive,

    #[error("password is not valid")]
    PasswordNotValid,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("refresh token not found")]
    RefreshTokenNotFound,

    #[error("error parsing token")]
    ParsingToken,

    #[error("unauthorized")]
    Unauthorized,

    #[error("db internal error")]
    DbInternal,

    #[error("cancelled")]
    Cancelled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}
