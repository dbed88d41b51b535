//! Password hashing via bcrypt.
//!
//! The salt and cost are embedded in the stored hash, so verification needs
//! nothing but the plaintext and the stored string.

use super::AuthError;

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Longest accepted password, in characters.
pub const MAX_PASSWORD_LEN: usize = 60;

/// bcrypt reads only this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a password with bcrypt (cost 10).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_cost(password, BCRYPT_COST)
}

/// Hash a password with an explicit bcrypt cost.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
///
/// The comparison is constant-time. A malformed stored hash is a mismatch,
/// never an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Run [`hash_password_with_cost`] on the blocking pool.
pub async fn hash_password_blocking(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_with_cost(&password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("password hashing task: {e}")))?
}

/// Run [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("password verification task: {e}")))
}

/// Check the length bounds on a candidate password.
pub fn validate_password_length(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN || password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters and {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}
