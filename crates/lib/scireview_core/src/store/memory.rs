//! In-memory implementation of the storage ports.
//!
//! Transactions are fully serialized: `begin` takes a store-wide writer lock
//! held until the transaction is committed, rolled back or dropped. Writes are
//! buffered in the transaction and applied in order on commit, so a dropped
//! transaction leaves no trace. Reads outside a transaction see committed
//! state only.
//!
//! Like Postgres, a transaction that has written a row referencing a user
//! (a login attempt or a refresh token) may not take that user's session
//! lock afterwards: on Postgres the foreign key already holds a share lock
//! on the user row, and upgrading it deadlocks against a concurrent login.
//!
//! [`Fault`]s can be armed to make individual operations fail, which is how
//! the failure branches of the protocols are exercised in tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    LoginAttemptJournal, RefreshTokenStore, StoreError, Transactional, UserDirectory,
};
use crate::models::auth::{LoginAttempt, RefreshToken, User};

/// An operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    Commit,
    FindUser,
    WriteUser,
    AppendAttempt,
    InsertToken,
    InvalidateAll,
    InvalidateOne,
    FindToken,
    LockToken,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    attempts: Vec<LoginAttempt>,
    tokens: Vec<RefreshToken>,
}

#[derive(Debug)]
enum PendingOp {
    Append(LoginAttempt),
    Insert(RefreshToken),
    InvalidateAll(Uuid),
    Invalidate(Uuid),
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    writer: Arc<AsyncMutex<()>>,
    faults: Mutex<HashSet<Fault>>,
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

/// Open transaction on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTx {
    ops: Vec<PendingOp>,
    referenced: HashSet<Uuid>,
    _writer: OwnedMutexGuard<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `fault` fail until healed.
    pub fn fail(&self, fault: Fault) {
        lock(&self.inner.faults).insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        lock(&self.inner.faults).remove(&fault);
    }

    pub fn heal_all(&self) {
        lock(&self.inner.faults).clear();
    }

    /// Add a user directly, bypassing validation.
    pub fn insert_user(&self, user: User) {
        lock(&self.inner.state).users.push(user);
    }

    /// Committed login attempts, in append order.
    pub fn login_attempts(&self) -> Vec<LoginAttempt> {
        lock(&self.inner.state).attempts.clone()
    }

    /// Committed refresh tokens, in insert order.
    pub fn refresh_tokens(&self) -> Vec<RefreshToken> {
        lock(&self.inner.state).tokens.clone()
    }

    pub fn refresh_token(&self, id: Uuid) -> Option<RefreshToken> {
        lock(&self.inner.state)
            .tokens
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Committed active refresh tokens of one user.
    pub fn active_tokens_for(&self, user_id: Uuid) -> Vec<RefreshToken> {
        lock(&self.inner.state)
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.active)
            .cloned()
            .collect()
    }

    fn check(&self, fault: Fault) -> Result<(), StoreError> {
        if lock(&self.inner.faults).contains(&fault) {
            return Err(StoreError::Backend(format!("injected failure: {fault:?}")));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl State {
    fn apply(&mut self, op: PendingOp) {
        match op {
            PendingOp::Append(attempt) => self.attempts.push(attempt),
            PendingOp::Insert(token) => self.tokens.push(token),
            PendingOp::InvalidateAll(user_id) => self
                .tokens
                .iter_mut()
                .filter(|t| t.user_id == user_id)
                .for_each(|t| t.active = false),
            PendingOp::Invalidate(id) => self
                .tokens
                .iter_mut()
                .filter(|t| t.id == id)
                .for_each(|t| t.active = false),
        }
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        self.check(Fault::Begin)?;
        let writer = Arc::clone(&self.inner.writer).lock_owned().await;
        Ok(MemoryTx {
            ops: Vec::new(),
            referenced: HashSet::new(),
            _writer: writer,
        })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        self.check(Fault::Commit)?;
        let mut state = lock(&self.inner.state);
        for op in tx.ops {
            state.apply(op);
        }
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check(Fault::FindUser)?;
        let wanted = email.to_lowercase();
        Ok(lock(&self.inner.state)
            .users
            .iter()
            .find(|u| u.email.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.check(Fault::FindUser)?;
        Ok(lock(&self.inner.state)
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        self.check(Fault::WriteUser)?;
        let mut state = lock(&self.inner.state);
        if let Some(existing) = state.users.iter_mut().find(|u| u.id == user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.check(Fault::WriteUser)?;
        let mut state = lock(&self.inner.state);
        let email = user.email.to_lowercase();
        if state.users.iter().any(|u| u.email.to_lowercase() == email) {
            return Err(StoreError::Backend(format!(
                "duplicate email: {}",
                user.email
            )));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        self.check(Fault::FindUser)?;
        let mut users = lock(&self.inner.state).users.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}

#[async_trait]
impl LoginAttemptJournal for MemoryStore {
    async fn append(&self, tx: &mut MemoryTx, attempt: &LoginAttempt) -> Result<(), StoreError> {
        self.check(Fault::AppendAttempt)?;
        if let Some(user_id) = attempt.user_id {
            tx.referenced.insert(user_id);
        }
        tx.ops.push(PendingOp::Append(attempt.clone()));
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(&self, tx: &mut MemoryTx, token: &RefreshToken) -> Result<(), StoreError> {
        self.check(Fault::InsertToken)?;
        tx.referenced.insert(token.user_id);
        tx.ops.push(PendingOp::Insert(token.clone()));
        Ok(())
    }

    async fn invalidate_all_for(&self, tx: &mut MemoryTx, user_id: Uuid) -> Result<(), StoreError> {
        self.check(Fault::InvalidateAll)?;
        tx.ops.push(PendingOp::InvalidateAll(user_id));
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshToken>, StoreError> {
        self.check(Fault::FindToken)?;
        Ok(self.refresh_token(id))
    }

    async fn invalidate_by_id(&self, tx: &mut MemoryTx, id: Uuid) -> Result<(), StoreError> {
        self.check(Fault::InvalidateOne)?;
        tx.ops.push(PendingOp::Invalidate(id));
        Ok(())
    }

    async fn lock_user_sessions(&self, tx: &mut MemoryTx, user_id: Uuid) -> Result<(), StoreError> {
        // The writer lock already serializes every transaction.
        if tx.referenced.contains(&user_id) {
            return Err(StoreError::Backend(format!(
                "session lock on user {user_id} requested after writing rows that reference it"
            )));
        }
        Ok(())
    }

    async fn lock_active(&self, _tx: &mut MemoryTx, id: Uuid) -> Result<bool, StoreError> {
        self.check(Fault::LockToken)?;
        Ok(self.refresh_token(id).is_some_and(|t| t.active))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn token_for(user_id: Uuid) -> RefreshToken {
        RefreshToken::issue(user_id, None, Duration::hours(24))
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        let token = token_for(uid);

        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &token).await.unwrap();
        assert!(store.refresh_token(token.id).is_none());

        store.commit(tx).await.unwrap();
        assert_eq!(store.refresh_token(token.id), Some(token));
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        {
            let mut tx = store.begin().await.unwrap();
            store.insert(&mut tx, &token_for(uid)).await.unwrap();
        }
        assert!(store.refresh_tokens().is_empty());

        // The writer lock was released by the drop.
        let tx = store.begin().await.unwrap();
        store.rollback(tx).await.unwrap();
    }

    #[tokio::test]
    async fn invalidate_all_then_insert_leaves_only_new_token_active() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        let first = token_for(uid);
        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &first).await.unwrap();
        store.commit(tx).await.unwrap();

        let second = token_for(uid);
        let mut tx = store.begin().await.unwrap();
        store.invalidate_all_for(&mut tx, uid).await.unwrap();
        store.insert(&mut tx, &second).await.unwrap();
        store.commit(tx).await.unwrap();

        let active = store.active_tokens_for(uid);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
        assert!(!store.refresh_token(first.id).unwrap().active);
    }

    #[tokio::test]
    async fn invalidate_all_leaves_other_users_alone() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &token_for(a)).await.unwrap();
        store.insert(&mut tx, &token_for(b)).await.unwrap();
        store.invalidate_all_for(&mut tx, a).await.unwrap();
        store.commit(tx).await.unwrap();

        assert!(store.active_tokens_for(a).is_empty());
        assert_eq!(store.active_tokens_for(b).len(), 1);
    }

    #[tokio::test]
    async fn lock_active_reports_missing_and_inactive_as_false() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();
        let token = token_for(uid);
        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &token).await.unwrap();
        store.commit(tx).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(store.lock_active(&mut tx, token.id).await.unwrap());
        assert!(!store.lock_active(&mut tx, Uuid::new_v4()).await.unwrap());
        store.invalidate_by_id(&mut tx, token.id).await.unwrap();
        store.commit(tx).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(!store.lock_active(&mut tx, token.id).await.unwrap());
    }

    #[tokio::test]
    async fn user_lock_must_precede_referencing_writes() {
        let store = MemoryStore::new();
        let uid = Uuid::new_v4();

        let mut tx = store.begin().await.unwrap();
        store.lock_user_sessions(&mut tx, uid).await.unwrap();
        store.insert(&mut tx, &token_for(uid)).await.unwrap();
        store.commit(tx).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &token_for(uid)).await.unwrap();
        assert!(matches!(
            store.lock_user_sessions(&mut tx, uid).await,
            Err(StoreError::Backend(_))
        ));
        // Other users are unaffected.
        store.lock_user_sessions(&mut tx, Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let store = MemoryStore::new();
        store.insert_user(User::new("Ann", "Ann@Example.org", "h".into()));
        let found = store.find_by_email("ann@example.ORG").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_refused() {
        let store = MemoryStore::new();
        store.create(&User::new("Ann", "a@x", "h".into())).await.unwrap();
        assert!(store.create(&User::new("Bob", "A@X", "h".into())).await.is_err());
    }

    #[tokio::test]
    async fn armed_fault_fails_until_healed() {
        let store = MemoryStore::new();
        store.fail(Fault::FindUser);
        assert!(matches!(
            UserDirectory::find_by_id(&store, Uuid::new_v4()).await,
            Err(StoreError::Backend(_))
        ));
        store.heal(Fault::FindUser);
        assert!(UserDirectory::find_by_id(&store, Uuid::new_v4()).await.unwrap().is_none());
    }
}
