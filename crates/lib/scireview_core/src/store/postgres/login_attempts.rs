//! `login_attempts` table writes.

use async_trait::async_trait;

use super::PgStore;
use crate::models::auth::LoginAttempt;
use crate::store::{LoginAttemptJournal, StoreError, Transactional};

#[async_trait]
impl LoginAttemptJournal for PgStore {
    async fn append(
        &self,
        tx: &mut <Self as Transactional>::Tx,
        attempt: &LoginAttempt,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO login_attempts (id, user_id, email, success, ip_address, user_agent, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(attempt.id)
        .bind(attempt.user_id)
        .bind(&attempt.email)
        .bind(attempt.success)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.timestamp)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
