//! User administration over the user directory port.
//!
//! Registration, the admin bootstrap, activation and password changes. Admin
//! operations check the acting principal against the directory on every call,
//! so a demoted or deactivated admin loses access immediately.

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::auth::password::{
    BCRYPT_COST, hash_password_blocking, validate_password_length, verify_password_blocking,
};
use crate::auth::service::db_internal;
use crate::models::auth::{Principal, Role, User};
use crate::store::{AuthStore, RefreshTokenStore, UserDirectory};

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_EMAIL_LEN: usize = 350;

/// Check name, email and password of a new account.
pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), AuthError> {
    let name_len = name.trim().chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&name_len) {
        return Err(AuthError::Validation(format!(
            "Name must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
        )));
    }
    validate_email(email)?;
    validate_password_length(password)
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !well_formed || email.chars().any(char::is_whitespace) {
        return Err(AuthError::Validation("Email is not valid".into()));
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(AuthError::Validation(format!(
            "Email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UserService<S> {
    store: S,
    cost: u32,
}

impl<S: AuthStore> UserService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cost: BCRYPT_COST,
        }
    }

    /// Use a different bcrypt cost for new hashes.
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Create an inactive reviewer account.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        validate_registration(name, email, password)?;
        self.create(name.trim(), email, password, Role::Reviewer, false)
            .await
    }

    /// Create an active admin unless the email is already taken.
    ///
    /// Returns `true` when a user was created.
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<bool, AuthError> {
        validate_registration(name, email, password)?;
        match self.create(name.trim(), email, password, Role::Admin, true).await {
            Ok(user) => {
                info!(user_id = %user.id, email, "admin user created");
                Ok(true)
            }
            Err(AuthError::UserAlreadyExists) => {
                info!(email, "admin user already exists");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// A user as seen by `actor`, who must be that user or an admin.
    pub async fn find_by_id(&self, actor: &Principal, user_id: Uuid) -> Result<User, AuthError> {
        let user = self.load(user_id).await?;
        if actor.user_id != user_id {
            self.require_admin(actor).await?;
        }
        if !user.active {
            warn!(%user_id, "find user: user not active");
            return Err(AuthError::UserNotActive);
        }
        Ok(user)
    }

    /// All users, newest first. Admin only.
    pub async fn list(&self, actor: &Principal) -> Result<Vec<User>, AuthError> {
        self.require_admin(actor).await?;
        self.store.list().await.map_err(db_internal("list users"))
    }

    pub async fn activate(&self, actor: &Principal, user_id: Uuid) -> Result<User, AuthError> {
        self.require_admin(actor).await?;
        let mut user = self.load(user_id).await?;
        if user.active {
            warn!(%user_id, "activate: user already active");
            return Err(AuthError::Validation("User is already active".into()));
        }
        // Tokens left over from an interrupted deactivation must not revive.
        self.retire_sessions(user_id).await?;
        user.active = true;
        user.updated_at = Utc::now();
        self.store
            .update(&user)
            .await
            .map_err(db_internal("activate user"))?;
        info!(%user_id, by = %actor.user_id, "user activated");
        Ok(user)
    }

    /// Deactivate a user and retire all of their refresh tokens.
    ///
    /// The flag is written first. If retiring the tokens then fails the caller
    /// gets `DbInternal`, but the leftover tokens are already unusable: login
    /// and rotate both refuse inactive users, and [`Self::activate`] retires
    /// them before the user is let back in.
    pub async fn deactivate(&self, actor: &Principal, user_id: Uuid) -> Result<User, AuthError> {
        self.require_admin(actor).await?;
        let mut user = self.load(user_id).await?;
        if !user.active {
            warn!(%user_id, "deactivate: user already inactive");
            return Err(AuthError::Validation("User is already inactive".into()));
        }
        user.active = false;
        user.updated_at = Utc::now();
        self.store
            .update(&user)
            .await
            .map_err(db_internal("deactivate user"))?;

        self.retire_sessions(user_id).await?;

        info!(%user_id, by = %actor.user_id, "user deactivated");
        Ok(user)
    }

    /// Replace the caller's own password after checking the current one.
    pub async fn change_password(
        &self,
        actor: &Principal,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self.load(user_id).await?;
        if actor.user_id != user_id {
            warn!(%user_id, actor = %actor.user_id, "change password: not own account");
            return Err(AuthError::Forbidden);
        }
        if !user.active {
            warn!(%user_id, "change password: user not active");
            return Err(AuthError::UserNotActive);
        }
        if !verify_password_blocking(current_password, &user.password_hash).await? {
            warn!(%user_id, "change password: current password not valid");
            return Err(AuthError::PasswordNotValid);
        }
        validate_password_length(new_password)?;

        user.password_hash = hash_password_blocking(new_password, self.cost).await?;
        user.updated_at = Utc::now();
        self.store
            .update(&user)
            .await
            .map_err(db_internal("change password"))?;
        info!(%user_id, "password changed");
        Ok(())
    }

    async fn create(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
        active: bool,
    ) -> Result<User, AuthError> {
        let existing = self
            .store
            .find_by_email(email)
            .await
            .map_err(db_internal("create user: lookup"))?;
        if existing.is_some() {
            warn!(email, "create user: email already registered");
            return Err(AuthError::UserAlreadyExists);
        }

        let hash = hash_password_blocking(password, self.cost).await?;
        let mut user = User::new(name, email, hash);
        user.role = role;
        user.active = active;
        self.store
            .create(&user)
            .await
            .map_err(db_internal("create user"))?;
        info!(user_id = %user.id, %role, "user created");
        Ok(user)
    }

    /// Invalidate every refresh token of a user in a one-shot transaction.
    async fn retire_sessions(&self, user_id: Uuid) -> Result<(), AuthError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(db_internal("retire sessions: begin"))?;
        if let Err(e) = RefreshTokenStore::invalidate_all_for(&self.store, &mut tx, user_id).await {
            if let Err(rollback) = self.store.rollback(tx).await {
                error!(error = %rollback, "rollback failed");
            }
            return Err(db_internal("retire sessions: invalidate")(e));
        }
        self.store
            .commit(tx)
            .await
            .map_err(db_internal("retire sessions: commit"))
    }

    async fn load(&self, user_id: Uuid) -> Result<User, AuthError> {
        UserDirectory::find_by_id(&self.store, user_id)
            .await
            .map_err(db_internal("find user"))?
            .ok_or_else(|| {
                warn!(%user_id, "user not found");
                AuthError::UserNotFound
            })
    }

    /// The acting user must exist, be active and hold the admin role.
    async fn require_admin(&self, actor: &Principal) -> Result<User, AuthError> {
        let user = self.load(actor.user_id).await?;
        if !user.active {
            warn!(actor = %actor.user_id, "admin check: actor not active");
            return Err(AuthError::UserNotActive);
        }
        if !user.is_admin() {
            warn!(actor = %actor.user_id, "admin check: actor not admin");
            return Err(AuthError::Forbidden);
        }
        Ok(user)
    }
}
