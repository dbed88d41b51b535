//! API server configuration.

use std::time::Duration;

use scireview_core::auth::jwt::{SettingsError, TokenSettings};
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3100";
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/sci_review";
pub const DEFAULT_AUTH_DEADLINE_SECS: u64 = 10;

/// Invalid or incomplete server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Token(#[from] SettingsError),

    #[error("invalid setting {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("ADMIN_NAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together")]
    IncompleteAdmin,
}

/// Account created at startup when it does not exist yet.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"******")
            .finish()
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Token codec settings.
    pub token: TokenSettings,
    /// Upper bound on every auth call made by a handler.
    pub auth_deadline: Duration,
    pub admin: Option<AdminBootstrap>,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable             | Default                                  |
    /// |----------------------|------------------------------------------|
    /// | `BIND_ADDR`          | `127.0.0.1:3100`                         |
    /// | `DATABASE_URL`       | `postgres://localhost:5432/sci_review`   |
    /// | `AUTH_DEADLINE_SECS` | `10`                                     |
    /// | `JWT_*`, `*_TOKEN_DURATION` | required, see [`TokenSettings`]   |
    /// | `ADMIN_NAME`, `ADMIN_EMAIL`, `ADMIN_PASSWORD` | optional, all or none |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let auth_deadline = match optional("AUTH_DEADLINE_SECS") {
            None => Duration::from_secs(DEFAULT_AUTH_DEADLINE_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "AUTH_DEADLINE_SECS",
                        reason: format!("{raw:?} is not a positive number of seconds"),
                    });
                }
            },
        };

        let admin = match (
            optional("ADMIN_NAME"),
            optional("ADMIN_EMAIL"),
            optional("ADMIN_PASSWORD"),
        ) {
            (Some(name), Some(email), Some(password)) => Some(AdminBootstrap {
                name,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => return Err(ConfigError::IncompleteAdmin),
        };

        Ok(Self {
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            pg_connection_url: optional("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            token: TokenSettings::from_lookup(&lookup)?,
            auth_deadline,
            admin,
        })
    }
}
