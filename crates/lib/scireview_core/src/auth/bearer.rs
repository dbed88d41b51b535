//! Bearer header verification for protected requests.

use tracing::debug;

use super::AuthError;
use super::jwt::TokenCodec;
use crate::models::auth::Principal;

/// Literal scheme prefix, including its single separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Turn an `Authorization` header value into a [`Principal`].
///
/// The scheme is case-sensitive and must be followed by exactly one space and
/// a token containing no whitespace. Any failure is [`AuthError::Unauthorized`].
pub fn authenticate(codec: &TokenCodec, header: &str) -> Result<Principal, AuthError> {
    let Some(token) = header
        .strip_prefix(BEARER_PREFIX)
        .filter(|t| !t.is_empty() && !t.contains(char::is_whitespace))
    else {
        debug!("bearer header malformed");
        return Err(AuthError::Unauthorized);
    };

    let claims = codec.verify_access(token).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        AuthError::Unauthorized
    })?;
    let user_id = claims.user_id().map_err(|e| {
        debug!(error = %e, "bearer subject is not a user id");
        AuthError::Unauthorized
    })?;

    Ok(Principal {
        user_id,
        role: claims.role,
    })
}
