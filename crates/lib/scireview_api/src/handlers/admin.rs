//! Admin-only user management handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use scireview_core::auth::with_deadline;
use scireview_core::models::auth::{Principal, PublicUser};
use scireview_core::store::AuthStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppResult, user_lookup_error};
use crate::models::UserListResponse;

/// `GET /admin/users`: all users, newest first.
pub async fn list_users_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<UserListResponse>> {
    let users = with_deadline(state.config.auth_deadline, state.users.list(&principal)).await?;
    Ok(Json(UserListResponse {
        users: users.iter().map(PublicUser::from).collect(),
    }))
}

/// `POST /admin/users/{id}/activate`
pub async fn activate_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    let user = with_deadline(
        state.config.auth_deadline,
        state.users.activate(&principal, user_id),
    )
    .await
    .map_err(user_lookup_error)?;
    Ok(Json(PublicUser::from(&user)))
}

/// `POST /admin/users/{id}/deactivate`: also ends all of the user's sessions.
pub async fn deactivate_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    let user = with_deadline(
        state.config.auth_deadline,
        state.users.deactivate(&principal, user_id),
    )
    .await
    .map_err(user_lookup_error)?;
    Ok(Json(PublicUser::from(&user)))
}
