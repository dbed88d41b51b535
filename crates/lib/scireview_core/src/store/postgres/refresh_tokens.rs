//! `refresh_tokens` table queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::models::auth::RefreshToken;
use crate::store::{RefreshTokenStore, StoreError, Transactional};

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    parent_token_id: Option<Uuid>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    active: bool,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            user_id: row.user_id,
            parent_token_id: row.parent_token_id,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            active: row.active,
        }
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert(
        &self,
        tx: &mut <Self as Transactional>::Tx,
        token: &RefreshToken,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, parent_token_id, issued_at, expires_at, active) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.parent_token_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.active)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn invalidate_all_for(
        &self,
        tx: &mut <Self as Transactional>::Tx,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE refresh_tokens SET active = false WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshToken>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, user_id, parent_token_id, issued_at, expires_at, active \
             FROM refresh_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(RefreshToken::from))
    }

    async fn invalidate_by_id(
        &self,
        tx: &mut <Self as Transactional>::Tx,
        id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE refresh_tokens SET active = false WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn lock_user_sessions(
        &self,
        tx: &mut <Self as Transactional>::Tx,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(())
    }

    async fn lock_active(
        &self,
        tx: &mut <Self as Transactional>::Tx,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM refresh_tokens WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(active.unwrap_or(false))
    }
}
