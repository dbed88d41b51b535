//! Authentication request handlers.

use axum::extract::State;
use axum::{Extension, Json};
use scireview_core::auth::with_deadline;
use scireview_core::models::auth::{LoginRequest, Principal, TokenResponse};
use scireview_core::store::AuthStore;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::client::ClientMeta;
use crate::models::{LoginBody, RefreshTokenBody, SuccessResponse};

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    client: ClientMeta,
    Json(body): Json<LoginBody>,
) -> AppResult<Json<TokenResponse>> {
    let request = LoginRequest {
        email: body.email,
        password: body.password,
        ip_address: client.ip_address,
        user_agent: client.user_agent,
    };
    let resp = with_deadline(state.config.auth_deadline, state.auth.login(&request)).await?;
    Ok(Json(resp))
}

/// `POST /auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Json(body): Json<RefreshTokenBody>,
) -> AppResult<Json<TokenResponse>> {
    let resp = with_deadline(
        state.config.auth_deadline,
        state.auth.rotate(&body.refresh_token),
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/logout`: retire a refresh token.
pub async fn logout_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Json(body): Json<RefreshTokenBody>,
) -> AppResult<Json<SuccessResponse>> {
    with_deadline(
        state.config.auth_deadline,
        state.auth.logout(&body.refresh_token),
    )
    .await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// `GET /auth/me`: the principal behind the bearer token.
pub async fn me_handler(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}
