use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use scireview_core::auth::jwt::{MIN_KEY_LEN, TokenCodec, TokenSettings};
use scireview_core::auth::password::hash_password_with_cost;
use scireview_core::store::PgStore;
use scireview_core::users::UserService;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;

use crate::{Error, Result};

pub fn gen_key(length: usize) -> Result<String> {
    if length < MIN_KEY_LEN {
        return Err(Error::Custom(format!(
            "key length must be at least {MIN_KEY_LEN}"
        )));
    }
    Ok(rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect())
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(hash_password_with_cost(password, cost)?)
}

/// Claims of an access or refresh token as pretty JSON.
pub fn verify_token(token: &str) -> Result<String> {
    let codec = TokenCodec::new(TokenSettings::from_env()?)?;
    let rendered = match codec.verify_access(token) {
        Ok(claims) => json!({ "kind": "access", "claims": claims }),
        Err(access_err) => match codec.verify_refresh(token) {
            Ok(claims) => json!({ "kind": "refresh", "claims": claims }),
            Err(_) => return Err(access_err.into()),
        },
    };
    Ok(serde_json::to_string_pretty(&rendered)?)
}

/// Returns `true` when the admin was created.
pub fn create_admin(name: &str, email: &str, password: &str, database_url: &str) -> Result<bool> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        scireview_core::migrate::migrate(&pool).await?;
        let created = UserService::new(PgStore::new(pool.clone()))
            .ensure_admin(name, email, password)
            .await?;
        pool.close().await;
        Ok::<_, Error>(created)
    })
}
