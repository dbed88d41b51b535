//! # scireview_api
//!
//! HTTP boundary of the Sci Review auth core: login, token rotation, logout,
//! bearer-protected user routes and admin routes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use scireview_core::auth::AuthService;
use scireview_core::auth::jwt::{SettingsError, TokenCodec};
use scireview_core::store::AuthStore;
use scireview_core::users::UserService;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState<S> {
    pub auth: AuthService<S>,
    pub users: UserService<S>,
    /// API configuration.
    pub config: ApiConfig,
}

impl<S: AuthStore> AppState<S> {
    /// Build the services over `store`, with a codec from `config.token`.
    pub fn new(store: S, config: ApiConfig) -> Result<Self, SettingsError> {
        let codec = Arc::new(TokenCodec::new(config.token.clone())?);
        Ok(Self {
            auth: AuthService::new(store.clone(), codec),
            users: UserService::new(store),
            config,
        })
    }
}

/// Run embedded database migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    scireview_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router<S: AuthStore>(state: AppState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/login", post(auth::login_handler::<S>))
        .route("/auth/refresh", post(auth::refresh_handler::<S>))
        .route("/auth/logout", post(auth::logout_handler::<S>))
        .route("/users", post(users::register_handler::<S>));

    // Protected routes (require a bearer token)
    let protected = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/users/{id}", get(users::get_user_handler::<S>))
        .route(
            "/users/{id}/password",
            put(users::change_password_handler::<S>),
        )
        .route("/admin/users", get(admin::list_users_handler::<S>))
        .route(
            "/admin/users/{id}/activate",
            post(admin::activate_handler::<S>),
        )
        .route(
            "/admin/users/{id}/deactivate",
            post(admin::deactivate_handler::<S>),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth::<S>,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
