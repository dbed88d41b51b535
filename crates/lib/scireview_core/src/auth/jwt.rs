//! JWT token generation and verification.
//!
//! A [`TokenCodec`] is built once at startup from [`TokenSettings`] and shared
//! by reference. It mints HS256 access tokens (`role` claim) and refresh
//! tokens (`jti` claim), and verifies either kind into a typed claim record.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{AccessClaims, RefreshClaims, Role};

/// Minimum signing key length in bytes.
pub const MIN_KEY_LEN: usize = 32;

pub const ENV_JWT_KEY: &str = "JWT_KEY";
pub const ENV_JWT_ISSUER: &str = "JWT_ISSUER";
pub const ENV_ACCESS_TOKEN_DURATION: &str = "ACCESS_TOKEN_DURATION";
pub const ENV_REFRESH_TOKEN_DURATION: &str = "REFRESH_TOKEN_DURATION";

/// Why a token was rejected (or could not be minted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("wrong token issuer")]
    WrongIssuer,

    #[error("token encode: {0}")]
    Encode(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
            ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => TokenError::WrongIssuer,
            _ => TokenError::Malformed,
        }
    }
}

/// Invalid or missing codec configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Codec configuration, fixed at startup.
#[derive(Clone)]
pub struct TokenSettings {
    pub issuer: String,
    pub key: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("issuer", &self.issuer)
            .field("key", &"******")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenSettings {
    /// Settings with lifetimes given in whole hours.
    pub fn from_hours(issuer: &str, key: &str, access_hours: i64, refresh_hours: i64) -> Self {
        Self {
            issuer: issuer.to_string(),
            key: key.to_string(),
            access_ttl: Duration::hours(access_hours),
            refresh_ttl: Duration::hours(refresh_hours),
        }
    }

    /// Read settings from the process environment.
    ///
    /// | Variable                 | Meaning                         |
    /// |--------------------------|---------------------------------|
    /// | `JWT_KEY`                | signing secret, ≥ 32 bytes      |
    /// | `JWT_ISSUER`             | `iss` claim                     |
    /// | `ACCESS_TOKEN_DURATION`  | access lifetime, whole hours    |
    /// | `REFRESH_TOKEN_DURATION` | refresh lifetime, whole hours   |
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(SettingsError::Missing(name))
        };
        let hours = |name: &'static str| -> Result<i64, SettingsError> {
            let raw = required(name)?;
            raw.trim().parse::<i64>().map_err(|e| SettingsError::Invalid {
                var: name,
                reason: format!("{raw:?} is not an integer number of hours: {e}"),
            })
        };

        let settings = Self::from_hours(
            &required(ENV_JWT_ISSUER)?,
            &required(ENV_JWT_KEY)?,
            hours(ENV_ACCESS_TOKEN_DURATION)?,
            hours(ENV_REFRESH_TOKEN_DURATION)?,
        );
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.issuer.is_empty() {
            return Err(SettingsError::Missing(ENV_JWT_ISSUER));
        }
        if self.key.len() < MIN_KEY_LEN {
            return Err(SettingsError::Invalid {
                var: ENV_JWT_KEY,
                reason: format!("must be at least {MIN_KEY_LEN} bytes"),
            });
        }
        if self.access_ttl <= Duration::zero() {
            return Err(SettingsError::Invalid {
                var: ENV_ACCESS_TOKEN_DURATION,
                reason: "must be positive".into(),
            });
        }
        if self.refresh_ttl <= Duration::zero() {
            return Err(SettingsError::Invalid {
                var: ENV_REFRESH_TOKEN_DURATION,
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Mints and verifies HS256 bearer tokens. Stateless apart from its settings.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(settings: TokenSettings) -> Result<Self, SettingsError> {
        settings.validate()?;

        // Only HS256 is accepted; the issuer must match exactly; no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.key.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.key.as_bytes()),
            issuer: settings.issuer,
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            validation,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access token for `user_id` carrying `role`.
    pub fn mint_access(&self, user_id: Uuid, role: Role) -> Result<String, TokenError> {
        self.mint_access_at(user_id, role, Utc::now())
    }

    /// Mint an access token as if issued at `now`.
    pub fn mint_access_at(
        &self,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = AccessClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            role,
        };
        self.sign(&claims)
    }

    /// Mint a refresh token whose `jti` is the refresh-token row id.
    pub fn mint_refresh(&self, user_id: Uuid, token_id: Uuid) -> Result<String, TokenError> {
        self.mint_refresh_at(user_id, token_id, Utc::now())
    }

    /// Mint a refresh token as if issued at `now`.
    pub fn mint_refresh_at(
        &self,
        user_id: Uuid,
        token_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = RefreshClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            jti: token_id.to_string(),
        };
        self.sign(&claims)
    }

    /// Verify an access token and return its claims.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token)
    }

    /// Verify a refresh token and return its claims.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token)
    }

    fn sign<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        decode::<C>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}
