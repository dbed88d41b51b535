//! Storage ports consumed by the auth core.
//!
//! Every mutation of the login journal or the refresh-token store takes a
//! transaction handle obtained from [`Transactional::begin`]. Callers that
//! only need one write open a one-shot transaction themselves.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{LoginAttempt, RefreshToken, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Backend failures. Distinct from "not found", which is `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Opens and finishes transactions.
///
/// Dropping an open transaction without committing rolls it back.
#[async_trait]
pub trait Transactional: Send + Sync {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Lookup and persistence of users.
///
/// Email matching is case-insensitive. The returned user carries the
/// activity flag and password hash exactly as stored.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn update(&self, user: &User) -> Result<(), StoreError>;

    async fn create(&self, user: &User) -> Result<(), StoreError>;

    /// All users, newest first.
    async fn list(&self) -> Result<Vec<User>, StoreError>;
}

/// Append-only audit log of credential checks.
#[async_trait]
pub trait LoginAttemptJournal: Transactional {
    async fn append(&self, tx: &mut Self::Tx, attempt: &LoginAttempt) -> Result<(), StoreError>;
}

/// Persisted refresh-token records.
#[async_trait]
pub trait RefreshTokenStore: Transactional {
    async fn insert(&self, tx: &mut Self::Tx, token: &RefreshToken) -> Result<(), StoreError>;

    /// Set `active = false` on every token of `user_id`. Idempotent.
    async fn invalidate_all_for(&self, tx: &mut Self::Tx, user_id: Uuid)
    -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshToken>, StoreError>;

    /// Set `active = false` on one token. Idempotent.
    async fn invalidate_by_id(&self, tx: &mut Self::Tx, id: Uuid) -> Result<(), StoreError>;

    /// Serialize session changes for `user_id` until `tx` finishes.
    ///
    /// Must be called before `tx` writes any row referencing the user.
    async fn lock_user_sessions(&self, tx: &mut Self::Tx, user_id: Uuid)
    -> Result<(), StoreError>;

    /// Lock token `id` until `tx` finishes and report whether it is still
    /// active. A missing row reports `false`.
    async fn lock_active(&self, tx: &mut Self::Tx, id: Uuid) -> Result<bool, StoreError>;
}

/// Everything the auth protocols need from one backend.
pub trait AuthStore:
    UserDirectory + LoginAttemptJournal + RefreshTokenStore + Clone + 'static
{
}

impl<T> AuthStore for T where
    T: UserDirectory + LoginAttemptJournal + RefreshTokenStore + Clone + 'static
{
}
