//! Login, rotate and logout protocols.
//!
//! [`AuthService`] composes the password hasher, the token codec and the
//! storage ports. Each protocol writes through one transaction; tokens are
//! minted only after that transaction has committed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::bearer;
use super::jwt::{TokenCodec, TokenError};
use super::password::verify_password_blocking;
use crate::models::auth::{
    LoginAttempt, LoginRequest, Principal, PublicUser, RefreshToken, TokenResponse, User,
};
use crate::store::{AuthStore, RefreshTokenStore, StoreError, Transactional, UserDirectory};

/// Log a store failure and collapse it to [`AuthError::DbInternal`].
pub(crate) fn db_internal(op: &'static str) -> impl FnOnce(StoreError) -> AuthError {
    move |e| {
        error!(op, error = %e, "store failure");
        AuthError::DbInternal
    }
}

fn mint_failed(e: TokenError) -> AuthError {
    error!(error = %e, "token mint failed");
    AuthError::Internal(e.to_string())
}

/// Authentication orchestrator over one storage backend.
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    store: S,
    codec: Arc<TokenCodec>,
}

impl<S: AuthStore> AuthService<S> {
    pub fn new(store: S, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Verify credentials and open a new session.
    ///
    /// Every outcome appends exactly one login attempt. On success all earlier
    /// refresh tokens of the user are invalidated before the new one is stored.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AuthError> {
        let user = match self.store.find_by_email(&request.email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.journal_failure(request).await?;
                warn!(email = %request.email, ip = %request.ip_address, "login: user not found");
                return Err(AuthError::UserNotFound);
            }
            Err(e) => {
                error!(error = %e, "login: user lookup failed");
                self.journal_failure(request).await?;
                return Err(AuthError::DbInternal);
            }
        };

        if !user.active {
            self.journal_failure(request).await?;
            warn!(user_id = %user.id, ip = %request.ip_address, "login: user not active");
            return Err(AuthError::UserNotActive);
        }

        let verified = verify_password_blocking(&request.password, &user.password_hash).await;
        self.check_password(request, &user, verified).await?;

        // The user lock comes before any write that references the user row.
        let mut tx = self.store.begin().await.map_err(db_internal("login: begin"))?;
        if let Err(e) = self.store.lock_user_sessions(&mut tx, user.id).await {
            self.abort(tx).await;
            return Err(db_internal("login: lock sessions")(e));
        }
        let attempt = LoginAttempt::succeeded(user.id, request);
        if let Err(e) = self.store.append(&mut tx, &attempt).await {
            self.abort(tx).await;
            return Err(db_internal("login: append attempt")(e));
        }
        let token = match self.open_session(&mut tx, user.id, None).await {
            Ok(token) => token,
            Err(e) => {
                self.abort(tx).await;
                return Err(db_internal("login: open session")(e));
            }
        };
        self.store
            .commit(tx)
            .await
            .map_err(db_internal("login: commit"))?;

        info!(user_id = %user.id, ip = %request.ip_address, "login succeeded");
        self.token_response(&user, token.id)
    }

    /// Exchange a refresh token for a new pair, retiring the presented one.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let claims = self.codec.verify_refresh(refresh_token).map_err(|e| {
            warn!(error = %e, "rotate: refresh token rejected");
            AuthError::InvalidRefreshToken
        })?;
        let (user_id, token_id) = match (claims.user_id(), claims.token_id()) {
            (Ok(user_id), Ok(token_id)) => (user_id, token_id),
            _ => {
                warn!("rotate: refresh token claims are not ids");
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        let user = UserDirectory::find_by_id(&self.store, user_id)
            .await
            .map_err(db_internal("rotate: find user"))?
            .ok_or_else(|| {
                warn!(%user_id, "rotate: user not found");
                AuthError::UserNotFound
            })?;
        if !user.active {
            warn!(%user_id, "rotate: user not active");
            return Err(AuthError::InvalidRefreshToken);
        }

        let parent = RefreshTokenStore::find_by_id(&self.store, token_id)
            .await
            .map_err(db_internal("rotate: find refresh token"))?
            .ok_or_else(|| {
                warn!(%token_id, "rotate: refresh token not found");
                AuthError::RefreshTokenNotFound
            })?;
        if !parent.active || parent.user_id != user.id {
            warn!(%token_id, %user_id, "rotate: refresh token not usable");
            return Err(AuthError::InvalidRefreshToken);
        }

        let mut tx = self.store.begin().await.map_err(db_internal("rotate: begin"))?;
        if let Err(e) = self.store.lock_user_sessions(&mut tx, user.id).await {
            self.abort(tx).await;
            return Err(db_internal("rotate: lock sessions")(e));
        }
        match self.store.lock_active(&mut tx, parent.id).await {
            Ok(true) => {}
            Ok(false) => {
                self.abort(tx).await;
                warn!(%token_id, "rotate: refresh token retired concurrently");
                return Err(AuthError::InvalidRefreshToken);
            }
            Err(e) => {
                self.abort(tx).await;
                return Err(db_internal("rotate: lock refresh token")(e));
            }
        }
        let token = match self.open_session(&mut tx, user.id, Some(parent.id)).await {
            Ok(token) => token,
            Err(e) => {
                self.abort(tx).await;
                return Err(db_internal("rotate: open session")(e));
            }
        };
        self.store
            .commit(tx)
            .await
            .map_err(db_internal("rotate: commit"))?;

        info!(%user_id, parent = %parent.id, "refresh token rotated");
        self.token_response(&user, token.id)
    }

    /// Retire one refresh token. Retiring an inactive token succeeds.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let token_id = self
            .codec
            .verify_refresh(refresh_token)
            .ok()
            .and_then(|claims| claims.token_id().ok())
            .ok_or_else(|| {
                warn!("logout: refresh token could not be parsed");
                AuthError::ParsingToken
            })?;

        let token = RefreshTokenStore::find_by_id(&self.store, token_id)
            .await
            .map_err(db_internal("logout: find refresh token"))?
            .ok_or_else(|| {
                warn!(%token_id, "logout: refresh token not found");
                AuthError::RefreshTokenNotFound
            })?;

        let mut tx = self.store.begin().await.map_err(db_internal("logout: begin"))?;
        if let Err(e) = self.store.invalidate_by_id(&mut tx, token.id).await {
            self.abort(tx).await;
            return Err(db_internal("logout: invalidate")(e));
        }
        self.store
            .commit(tx)
            .await
            .map_err(db_internal("logout: commit"))?;

        info!(user_id = %token.user_id, %token_id, "logged out");
        Ok(())
    }

    /// Resolve an `Authorization` header value to a [`Principal`].
    pub fn authenticate(&self, header: &str) -> Result<Principal, AuthError> {
        bearer::authenticate(&self.codec, header)
    }

    /// Append one failed attempt in its own transaction.
    async fn journal_failure(&self, request: &LoginRequest) -> Result<(), AuthError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(db_internal("login: begin"))?;
        if let Err(e) = self.store.append(&mut tx, &LoginAttempt::failed(request)).await {
            self.abort(tx).await;
            return Err(db_internal("login: append attempt")(e));
        }
        self.store
            .commit(tx)
            .await
            .map_err(db_internal("login: commit"))
    }

    /// Retire every session of the user, then store a fresh token.
    /// The caller holds the user's session lock.
    async fn open_session(
        &self,
        tx: &mut <S as Transactional>::Tx,
        user_id: Uuid,
        parent: Option<Uuid>,
    ) -> Result<RefreshToken, StoreError> {
        let token = RefreshToken::issue(user_id, parent, self.codec.refresh_ttl());
        self.store.invalidate_all_for(tx, user_id).await?;
        self.store.insert(tx, &token).await?;
        Ok(token)
    }

    /// Journal a failed attempt unless the password verified, including when
    /// the verification task itself failed.
    async fn check_password(
        &self,
        request: &LoginRequest,
        user: &User,
        verified: Result<bool, AuthError>,
    ) -> Result<(), AuthError> {
        match verified {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.journal_failure(request).await?;
                warn!(user_id = %user.id, ip = %request.ip_address, "login: password not valid");
                Err(AuthError::PasswordNotValid)
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "login: password verification failed");
                self.journal_failure(request).await?;
                Err(e)
            }
        }
    }

    async fn abort(&self, tx: <S as Transactional>::Tx) {
        if let Err(e) = self.store.rollback(tx).await {
            error!(error = %e, "rollback failed");
        }
    }

    fn token_response(&self, user: &User, token_id: Uuid) -> Result<TokenResponse, AuthError> {
        Ok(TokenResponse {
            user: PublicUser::from(user),
            access_token: self
                .codec
                .mint_access(user.id, user.role)
                .map_err(mint_failed)?,
            refresh_token: self
                .codec
                .mint_refresh(user.id, token_id)
                .map_err(mint_failed)?,
        })
    }
}

/// Run `fut` unless `cancel` fires first.
///
/// A cancelled protocol future is dropped, and with it any open transaction.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("auth call cancelled");
            Err(AuthError::Cancelled)
        }
        result = fut => result,
    }
}

/// Run `fut` with a deadline; an elapsed deadline is [`AuthError::Cancelled`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?deadline, "auth call exceeded its deadline");
            Err(AuthError::Cancelled)
        }
    }
}
