//! User self-service handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use scireview_core::auth::with_deadline;
use scireview_core::models::auth::{Principal, PublicUser};
use scireview_core::store::AuthStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppResult, user_lookup_error};
use crate::models::{ChangePasswordBody, RegisterBody, SuccessResponse};

/// `POST /users`: register an inactive reviewer account.
pub async fn register_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Json(body): Json<RegisterBody>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let user = with_deadline(
        state.config.auth_deadline,
        state.users.register(&body.name, &body.email, &body.password),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

/// `GET /users/{id}`: a user, visible to themselves and to admins.
pub async fn get_user_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    let user = with_deadline(
        state.config.auth_deadline,
        state.users.find_by_id(&principal, user_id),
    )
    .await
    .map_err(user_lookup_error)?;
    Ok(Json(PublicUser::from(&user)))
}

/// `PUT /users/{id}/password`: change one's own password.
pub async fn change_password_handler<S: AuthStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ChangePasswordBody>,
) -> AppResult<Json<SuccessResponse>> {
    with_deadline(
        state.config.auth_deadline,
        state.users.change_password(
            &principal,
            user_id,
            &body.current_password,
            &body.new_password,
        ),
    )
    .await
    .map_err(user_lookup_error)?;
    Ok(Json(SuccessResponse { success: true }))
}
