//! Security-focused integration tests.
//!
//! These verify properties of the auth core that matter to an attacker:
//!
//! - Token forgery and tampering are rejected
//! - Secrets never appear in logs or client-facing errors
//! - Revoked sessions stay revoked under concurrent use

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use std::sync::Arc;
use ticketbook_auth::mocks::{MockActivityRepository, MockEmailProvider, MockUserRepository};
use ticketbook_auth::token::hash_for_storage;
use ticketbook_auth::{
    AccessGate, AuthConfig, AuthError, AuthService, LoginRequest, PasswordConfig,
    RegisterRequest, Role, SecretString, TokenIssuer, TokenKind, TokenTtls, UserId,
};

const PASSWORD: &str = "Corr3ct!Horse";

fn service() -> (
    Arc<AuthService<MockUserRepository, MockActivityRepository, MockEmailProvider>>,
    MockUserRepository,
) {
    let users = MockUserRepository::new();
    let auth = AuthService::new(
        AuthConfig::new("security-suite-secret").with_password(PasswordConfig::insecure_fast()),
        users.clone(),
        MockActivityRepository::new(),
        MockEmailProvider::new(),
    )
    .unwrap();
    (Arc::new(auth), users)
}

async fn register_and_login(
    auth: &AuthService<MockUserRepository, MockActivityRepository, MockEmailProvider>,
    username: &str,
    role: Role,
) -> ticketbook_auth::LoginResponse {
    auth.register(
        RegisterRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: SecretString::from(PASSWORD),
            full_name: username.to_string(),
            role,
        },
        None,
    )
    .await
    .unwrap();
    auth.login(
        LoginRequest {
            username: username.to_string(),
            password: SecretString::from(PASSWORD),
        },
        None,
    )
    .await
    .unwrap()
}

/// A token signed with another secret must not authenticate.
#[tokio::test]
async fn test_token_from_foreign_secret_is_rejected() {
    let (auth, _) = service();
    let forger = TokenIssuer::new(&SecretString::from("attacker-secret"), TokenTtls::default()).unwrap();
    let forged = forger
        .issue(TokenKind::Access, UserId::new(), Some(Role::Admin))
        .unwrap();

    let result = auth.verify_token(forged.token.expose_secret());

    assert!(matches!(result, Err(AuthError::Unauthorized(_))));
}

/// Flipping a payload byte invalidates the signature.
#[tokio::test]
async fn test_tampered_payload_is_rejected() {
    let (auth, _) = service();
    let login = register_and_login(&auth, "mallory", Role::User).await;
    let token = login.tokens.access_token.expose_secret().to_string();

    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let payload = parts[1].clone();
    let first = if payload.starts_with('e') { 'f' } else { 'e' };
    parts[1] = format!("{first}{}", &payload[1..]);
    let tampered = parts.join(".");

    assert!(auth.verify_token(&tampered).is_err());
}

/// An access token past its expiry no longer authenticates.
#[test]
fn test_expired_access_token_is_rejected() {
    let issuer = Arc::new(
        TokenIssuer::new(&SecretString::from("security-suite-secret"), TokenTtls::default()).unwrap(),
    );
    let gate = AccessGate::new(Arc::clone(&issuer));
    let expired = issuer
        .issue_with_ttl(TokenKind::Access, UserId::new(), Some(Role::User), Duration::seconds(-1))
        .unwrap();

    let header = format!("Bearer {}", expired.token.expose_secret());
    assert_eq!(
        gate.authenticate(Some(&header)),
        Err(AuthError::unauthorized("token has expired"))
    );
}

/// Regular users cannot pass an admin-only check.
#[tokio::test]
async fn test_user_role_cannot_reach_admin_operations() {
    let (auth, _) = service();
    let user = register_and_login(&auth, "ursula", Role::User).await;
    let admin = register_and_login(&auth, "ada", Role::Admin).await;

    let gate = auth.access_gate();
    let user_principal = gate.verify(user.tokens.access_token.expose_secret()).unwrap();
    let admin_principal = gate.verify(admin.tokens.access_token.expose_secret()).unwrap();

    assert!(matches!(
        AccessGate::authorize(&user_principal, &[Role::Admin]),
        Err(AuthError::Forbidden(_))
    ));
    assert!(AccessGate::authorize(&admin_principal, &[Role::Admin]).is_ok());
}

/// Only a digest of the refresh token is persisted.
#[tokio::test]
async fn test_refresh_token_is_never_stored_in_clear() {
    let (auth, users) = service();
    let login = register_and_login(&auth, "alice", Role::User).await;

    let stored = users.snapshot(login.profile.id).unwrap();
    let digest = stored.refresh_token_hash.unwrap();

    assert_ne!(digest, login.tokens.refresh_token.expose_secret());
    assert_eq!(digest, hash_for_storage(login.tokens.refresh_token.expose_secret()));
}

/// Two concurrent refreshes with the same token cannot both keep a session.
#[tokio::test]
async fn test_concurrent_refresh_leaves_at_most_one_live_session() {
    let (auth, _) = service();
    let login = register_and_login(&auth, "alice", Role::User).await;
    let token = login.tokens.refresh_token.clone();

    let (a, b) = tokio::join!(
        auth.refresh_token(&token, None),
        auth.refresh_token(&token, None)
    );

    let live: Vec<_> = [a, b].into_iter().filter_map(Result::ok).collect();
    let mut still_valid = 0;
    for pair in live {
        if auth.refresh_token(&pair.refresh_token, None).await.is_ok() {
            still_valid += 1;
        }
    }
    assert!(still_valid <= 1);
}

/// Debug output of secrets and users hides credentials.
#[tokio::test]
async fn test_debug_output_hides_credentials() {
    let (auth, users) = service();
    let login = register_and_login(&auth, "alice", Role::User).await;
    let stored = users.snapshot(login.profile.id).unwrap();

    let user_debug = format!("{stored:?}");
    assert!(!user_debug.contains(&stored.password_hash));
    assert!(!user_debug.contains(stored.refresh_token_hash.as_deref().unwrap()));

    let tokens_debug = format!("{:?}", login.tokens);
    assert!(!tokens_debug.contains(login.tokens.access_token.expose_secret()));
    assert!(!tokens_debug.contains(login.tokens.refresh_token.expose_secret()));
}

/// Infrastructure failures never reach the client verbatim.
#[test]
fn test_internal_errors_are_masked() {
    let db = AuthError::DatabaseError("relation \"users\" does not exist".to_string());
    let internal = AuthError::InternalError("signing key rejected".to_string());

    assert_eq!(db.public_message(), "An internal error occurred");
    assert_eq!(internal.public_message(), "An internal error occurred");
    assert!(!db.is_user_error());
    assert!(AuthError::unauthorized("invalid credentials").is_user_error());
}
