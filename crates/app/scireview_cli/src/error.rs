use scireview_core::auth::AuthError;
use scireview_core::auth::jwt::{SettingsError, TokenError};
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Settings: {}", .0)]
    Settings(#[from] SettingsError),

    #[error("Token: {}", .0)]
    Token(#[from] TokenError),

    #[error("Auth: {}", .0)]
    Auth(#[from] AuthError),

    #[error("Sql: {}", .0)]
    Sql(#[from] sqlx::Error),

    #[error("Migrate: {}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Json: {}", .0)]
    Json(#[from] serde_json::Error),
}
