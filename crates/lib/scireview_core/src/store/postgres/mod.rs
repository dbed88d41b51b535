//! Postgres implementation of the storage ports.
//!
//! Transactions run at the server default (READ COMMITTED). Strict single
//! session per user comes from row locks taken inside the transaction, see
//! [`RefreshTokenStore::lock_user_sessions`](super::RefreshTokenStore::lock_user_sessions).

mod login_attempts;
mod refresh_tokens;
mod users;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{StoreError, Transactional};

/// Storage backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Transactional for PgStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError> {
        Ok(tx.rollback().await?)
    }
}
