//! Bearer authentication middleware.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use scireview_core::auth::AuthError;
use scireview_core::store::AuthStore;

use crate::AppState;
use crate::error::AppError;

/// Axum middleware: verifies `Authorization: Bearer <token>` and injects the
/// resulting [`Principal`](scireview_core::models::auth::Principal) into
/// request extensions.
pub async fn require_auth<S: AuthStore>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    let principal = state.auth.authenticate(header)?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
