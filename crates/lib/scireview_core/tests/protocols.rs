//! Login, rotate, logout and bearer protocols against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use scireview_core::auth::jwt::{TokenCodec, TokenSettings};
use scireview_core::auth::password::hash_password_with_cost;
use scireview_core::auth::{AuthError, AuthService, cancellable, with_deadline};
use scireview_core::models::auth::{LoginRequest, Principal, Role, TokenResponse, User};
use scireview_core::store::memory::Fault;
use scireview_core::store::{MemoryStore, Transactional};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const KEY: &str = "0123456789abcdef0123456789abcdef";

fn codec() -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(TokenSettings::from_hours("sci-review", KEY, 1, 24)).unwrap())
}

fn service() -> AuthService<MemoryStore> {
    AuthService::new(MemoryStore::new(), codec())
}

fn seed(service: &AuthService<MemoryStore>, email: &str, password: &str, active: bool) -> User {
    let mut user = User::new("Seeded", email, hash_password_with_cost(password, 4).unwrap());
    user.active = active;
    service.store().insert_user(user.clone());
    user
}

fn request(email: &str, password: &str, ip: &str) -> LoginRequest {
    LoginRequest {
        email: email.into(),
        password: password.into(),
        ip_address: ip.into(),
        user_agent: "ua/1".into(),
    }
}

fn refresh_id(service: &AuthService<MemoryStore>, response: &TokenResponse) -> Uuid {
    service
        .codec()
        .verify_refresh(&response.refresh_token)
        .unwrap()
        .token_id()
        .unwrap()
}

/// S1 fixture: an active reviewer `a@x` / `pw` logged in once.
async fn logged_in() -> (AuthService<MemoryStore>, User, TokenResponse) {
    let service = service();
    let user = seed(&service, "a@x", "pw", true);
    let response = service
        .login(&request("a@x", "pw", "10.0.0.1"))
        .await
        .unwrap();
    (service, user, response)
}

#[tokio::test]
async fn happy_login() {
    let (service, user, response) = logged_in().await;

    assert!(!response.access_token.is_empty());
    assert!(!response.refresh_token.is_empty());
    assert_eq!(response.user.id, user.id);
    assert_eq!(response.user.role, Role::Reviewer);

    let attempts = service.store().login_attempts();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);
    assert_eq!(attempts[0].user_id, Some(user.id));
    assert_eq!(attempts[0].ip_address, "10.0.0.1");
    assert_eq!(attempts[0].user_agent, "ua/1");

    let active = service.store().active_tokens_for(user.id);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, refresh_id(&service, &response));
}

#[tokio::test]
async fn unknown_user() {
    let service = service();
    let err = service
        .login(&request("ghost@x", "pw", "10.0.0.2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));

    let attempts = service.store().login_attempts();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert_eq!(attempts[0].user_id, None);
    assert_eq!(attempts[0].email, "ghost@x");
    assert!(service.store().refresh_tokens().is_empty());
}

#[tokio::test]
async fn inactive_user() {
    let service = service();
    seed(&service, "b@x", "pw", false);
    let err = service
        .login(&request("b@x", "pw", "10.0.0.3"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserNotActive));

    let attempts = service.store().login_attempts();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert_eq!(attempts[0].user_id, None);
    assert!(service.store().refresh_tokens().is_empty());
}

#[tokio::test]
async fn wrong_password() {
    let service = service();
    seed(&service, "a@x", "pw", true);
    let err = service
        .login(&request("a@x", "not-pw", "10.0.0.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordNotValid));

    let attempts = service.store().login_attempts();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert!(service.store().refresh_tokens().is_empty());
}

#[tokio::test]
async fn email_match_ignores_case_but_journal_keeps_submission() {
    let service = service();
    let user = seed(&service, "a@x", "pw", true);
    service
        .login(&request("A@X", "pw", "10.0.0.1"))
        .await
        .unwrap();

    let attempts = service.store().login_attempts();
    assert_eq!(attempts[0].email, "A@X");
    assert_eq!(attempts[0].user_id, Some(user.id));
}

#[tokio::test]
async fn rotation_chain() {
    let (service, user, first) = logged_in().await;
    let r1 = refresh_id(&service, &first);

    let second = service.rotate(&first.refresh_token).await.unwrap();
    let r2 = refresh_id(&service, &second);

    let r2_row = service.store().refresh_token(r2).unwrap();
    assert_eq!(r2_row.parent_token_id, Some(r1));
    assert!(!service.store().refresh_token(r1).unwrap().active);

    let active = service.store().active_tokens_for(user.id);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, r2);

    let principal = service
        .authenticate(&format!("Bearer {}", second.access_token))
        .unwrap();
    assert_eq!(principal.user_id, user.id);
}

#[tokio::test]
async fn replay_of_rotated_token() {
    let (service, user, first) = logged_in().await;
    let second = service.rotate(&first.refresh_token).await.unwrap();
    let r2 = refresh_id(&service, &second);
    let rows_before = service.store().refresh_tokens().len();
    let attempts_before = service.store().login_attempts().len();

    let err = service.rotate(&first.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRefreshToken));

    assert_eq!(service.store().refresh_tokens().len(), rows_before);
    assert_eq!(service.store().login_attempts().len(), attempts_before);
    assert!(service.store().refresh_token(r2).unwrap().active);
    assert_eq!(service.store().active_tokens_for(user.id).len(), 1);
}

#[tokio::test]
async fn logout_is_idempotent() {
    let (service, user, first) = logged_in().await;
    let second = service.rotate(&first.refresh_token).await.unwrap();
    let r2 = refresh_id(&service, &second);

    service.logout(&second.refresh_token).await.unwrap();
    assert!(!service.store().refresh_token(r2).unwrap().active);

    service.logout(&second.refresh_token).await.unwrap();
    assert!(service.store().active_tokens_for(user.id).is_empty());
}

#[tokio::test]
async fn bearer_verification() {
    let service = service();
    let uid = Uuid::new_v4();
    let token = service.codec().mint_access(uid, Role::Reviewer).unwrap();

    assert_eq!(
        service.authenticate(&format!("Bearer {token}")).unwrap(),
        Principal {
            user_id: uid,
            role: Role::Reviewer
        }
    );
    assert!(matches!(
        service.authenticate(&format!("bearer {token}")),
        Err(AuthError::Unauthorized)
    ));
    assert!(matches!(
        service.authenticate(&format!("Bearer  {token}")),
        Err(AuthError::Unauthorized)
    ));
}

#[tokio::test]
async fn login_after_login_leaves_one_active_token() {
    let (service, user, first) = logged_in().await;
    let second = service
        .login(&request("a@x", "pw", "10.0.0.9"))
        .await
        .unwrap();

    let active = service.store().active_tokens_for(user.id);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, refresh_id(&service, &second));
    assert!(matches!(
        service.rotate(&first.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    ));
}

#[tokio::test]
async fn every_login_appends_one_matching_attempt() {
    let service = service();
    seed(&service, "a@x", "pw", true);
    seed(&service, "b@x", "pw", false);

    let calls = [
        ("a@x", "pw"),
        ("a@x", "bad"),
        ("b@x", "pw"),
        ("c@x", "pw"),
        ("a@x", "pw"),
    ];
    for (n, (email, password)) in calls.into_iter().enumerate() {
        let outcome = service.login(&request(email, password, "10.0.0.1")).await;
        let attempts = service.store().login_attempts();
        assert_eq!(attempts.len(), n + 1);
        assert_eq!(attempts[n].success, outcome.is_ok());
        assert_eq!(attempts[n].email, email);
    }
}

#[tokio::test]
async fn rotate_rejects_garbage_and_foreign_tokens() {
    let (service, _, response) = logged_in().await;

    for token in ["", "garbage", "a.b.c", response.access_token.as_str()] {
        assert!(matches!(
            service.rotate(token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    let foreign = TokenCodec::new(TokenSettings::from_hours("other", KEY, 1, 24))
        .unwrap()
        .mint_refresh(response.user.id, Uuid::new_v4())
        .unwrap();
    assert!(matches!(
        service.rotate(&foreign).await,
        Err(AuthError::InvalidRefreshToken)
    ));
}

#[tokio::test]
async fn rotate_with_unknown_ids() {
    let (service, user, _) = logged_in().await;

    let unknown_token = service.codec().mint_refresh(user.id, Uuid::new_v4()).unwrap();
    assert!(matches!(
        service.rotate(&unknown_token).await,
        Err(AuthError::RefreshTokenNotFound)
    ));

    let unknown_user = service
        .codec()
        .mint_refresh(Uuid::new_v4(), Uuid::new_v4())
        .unwrap();
    assert!(matches!(
        service.rotate(&unknown_user).await,
        Err(AuthError::UserNotFound)
    ));
}

#[tokio::test]
async fn rotate_for_deactivated_user_is_invalid() {
    let (service, user, response) = logged_in().await;
    let mut inactive = user.clone();
    inactive.active = false;
    scireview_core::store::UserDirectory::update(service.store(), &inactive)
        .await
        .unwrap();

    assert!(matches!(
        service.rotate(&response.refresh_token).await,
        Err(AuthError::InvalidRefreshToken)
    ));
}

#[tokio::test]
async fn logout_errors() {
    let (service, user, _) = logged_in().await;

    for token in ["", "garbage"] {
        assert!(matches!(
            service.logout(token).await,
            Err(AuthError::ParsingToken)
        ));
    }
    let expired = service
        .codec()
        .mint_refresh_at(
            user.id,
            Uuid::new_v4(),
            chrono::Utc::now() - chrono::Duration::hours(48),
        )
        .unwrap();
    assert!(matches!(
        service.logout(&expired).await,
        Err(AuthError::ParsingToken)
    ));

    let unknown = service.codec().mint_refresh(user.id, Uuid::new_v4()).unwrap();
    assert!(matches!(
        service.logout(&unknown).await,
        Err(AuthError::RefreshTokenNotFound)
    ));
}

#[tokio::test]
async fn failed_audit_append_surfaces_db_internal() {
    let service = service();
    service.store().fail(Fault::AppendAttempt);

    let err = service
        .login(&request("ghost@x", "pw", "10.0.0.2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DbInternal));
    assert!(service.store().login_attempts().is_empty());
}

#[tokio::test]
async fn failed_audit_commit_surfaces_db_internal() {
    let service = service();
    seed(&service, "a@x", "pw", true);
    service.store().fail(Fault::Commit);

    let err = service
        .login(&request("a@x", "wrong", "10.0.0.2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DbInternal));
    assert!(service.store().login_attempts().is_empty());
}

#[tokio::test]
async fn user_lookup_failure_is_db_internal_and_journaled() {
    let service = service();
    service.store().fail(Fault::FindUser);

    let err = service
        .login(&request("a@x", "pw", "10.0.0.2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DbInternal));
    let attempts = service.store().login_attempts();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
}

#[tokio::test]
async fn invalidate_failure_on_login_rolls_back() {
    let service = service();
    let user = seed(&service, "a@x", "pw", true);
    service.store().fail(Fault::InvalidateAll);

    let err = service
        .login(&request("a@x", "pw", "10.0.0.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DbInternal));
    assert!(service.store().login_attempts().is_empty());
    assert!(service.store().active_tokens_for(user.id).is_empty());
}

#[tokio::test]
async fn rotate_store_failures_keep_parent_active() {
    let (service, _, response) = logged_in().await;
    let r1 = refresh_id(&service, &response);

    for fault in [Fault::FindToken, Fault::LockToken, Fault::InsertToken, Fault::Commit] {
        service.store().fail(fault);
        assert!(
            matches!(
                service.rotate(&response.refresh_token).await,
                Err(AuthError::DbInternal)
            ),
            "{fault:?}"
        );
        service.store().heal(fault);
        assert!(service.store().refresh_token(r1).unwrap().active);
    }
    assert_eq!(service.store().refresh_tokens().len(), 1);
}

#[tokio::test]
async fn logout_store_failure_is_db_internal() {
    let (service, _, response) = logged_in().await;
    let r1 = refresh_id(&service, &response);
    service.store().fail(Fault::InvalidateOne);

    assert!(matches!(
        service.logout(&response.refresh_token).await,
        Err(AuthError::DbInternal)
    ));
    assert!(service.store().refresh_token(r1).unwrap().active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotations_of_one_parent_yield_one_winner() {
    let (service, user, response) = logged_in().await;

    let (a, b) = tokio::join!(
        service.rotate(&response.refresh_token),
        service.rotate(&response.refresh_token)
    );
    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for loser in [a, b].into_iter().filter_map(Result::err) {
        assert!(matches!(loser, AuthError::InvalidRefreshToken));
    }
    assert_eq!(service.store().active_tokens_for(user.id).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_leave_one_active_token() {
    let service = service();
    let user = seed(&service, "a@x", "pw", true);

    let mut handles = Vec::new();
    for n in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .login(&request("a@x", "pw", &format!("10.0.0.{n}")))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(service.store().login_attempts().len(), 8);
    assert_eq!(service.store().active_tokens_for(user.id).len(), 1);
    assert_eq!(service.store().refresh_tokens().len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_across_users_all_succeed() {
    let service = service();
    let users: Vec<User> = (0..5)
        .map(|n| seed(&service, &format!("u{n}@x"), "pw", true))
        .collect();

    let mut handles = Vec::new();
    for user in &users {
        for n in 0..8 {
            let service = service.clone();
            let email = user.email.clone();
            handles.push(tokio::spawn(async move {
                service
                    .login(&request(&email, "pw", &format!("10.0.1.{n}")))
                    .await
            }));
        }
    }
    let mut failures = Vec::new();
    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            failures.push(e);
        }
    }

    assert!(failures.is_empty(), "failed logins: {failures:?}");
    for user in &users {
        assert_eq!(service.store().active_tokens_for(user.id).len(), 1);
    }
    let attempts = service.store().login_attempts();
    assert_eq!(attempts.len(), 40);
    assert!(attempts.iter().all(|a| a.success));
}

#[tokio::test]
async fn cancellation_before_commit_rolls_back() {
    let service = service();
    let user = seed(&service, "a@x", "pw", true);
    let held = service.store().begin().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let req = request("a@x", "pw", "10.0.0.1");
    let result = cancellable(&cancel, service.login(&req)).await;
    assert!(matches!(result, Err(AuthError::Cancelled)));

    service.store().rollback(held).await.unwrap();
    assert!(service.store().login_attempts().is_empty());
    assert!(service.store().active_tokens_for(user.id).is_empty());
}

#[tokio::test]
async fn generous_deadline_does_not_interfere() {
    let (service, _, response) = logged_in().await;
    let rotated = with_deadline(Duration::from_secs(5), service.rotate(&response.refresh_token))
        .await
        .unwrap();
    assert!(!rotated.refresh_token.is_empty());
}

#[tokio::test]
async fn minted_access_token_carries_role_and_lifetime() {
    let service = service();
    let uid = Uuid::new_v4();
    for role in [Role::Admin, Role::Reviewer] {
        let claims = service
            .codec()
            .verify_access(&service.codec().mint_access(uid, role).unwrap())
            .unwrap();
        assert_eq!(claims.sub, uid.to_string());
        assert_eq!(claims.role, role);
        assert_eq!(claims.exp - claims.iat, 3600);
    }
}
