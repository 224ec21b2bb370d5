//! Shared handler state.

use crate::extractors::HasAccessGate;
use std::sync::Arc;
use ticketbook_auth::{AccessGate, AuthService, TokenIssuer};

/// Minimal application state: just what the auth extractors need.
///
/// Applications holding more (orchestrators, pools) implement
/// [`HasAccessGate`] on their own state instead.
#[derive(Clone, Debug)]
pub struct AppState {
    gate: Arc<AccessGate>,
}

impl AppState {
    /// State over an existing gate.
    #[must_use]
    pub fn new(gate: AccessGate) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }

    /// State verifying tokens from `issuer`.
    #[must_use]
    pub fn from_issuer(issuer: Arc<TokenIssuer>) -> Self {
        Self::new(AccessGate::new(issuer))
    }

    /// State verifying tokens issued by `auth`.
    #[must_use]
    pub fn from_auth<U, A, E>(auth: &AuthService<U, A, E>) -> Self
    where
        U: ticketbook_auth::UserRepository,
        A: ticketbook_auth::ActivityRepository,
        E: ticketbook_auth::EmailProvider,
    {
        Self::new(auth.access_gate())
    }
}

impl HasAccessGate for AppState {
    fn access_gate(&self) -> &AccessGate {
        &self.gate
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extractors::AuthenticatedUser;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::get,
    };
    use ticketbook_auth::mocks::{MockActivityRepository, MockEmailProvider, MockUserRepository};
    use ticketbook_auth::{AuthConfig, PasswordConfig, Role, TokenKind, UserId};
    use tower::ServiceExt;

    async fn whoami(AuthenticatedUser(principal): AuthenticatedUser) -> String {
        principal.user_id.to_string()
    }

    #[tokio::test]
    async fn router_authenticates_with_service_tokens() {
        let auth = AuthService::new(
            AuthConfig::new("state-secret").with_password(PasswordConfig::insecure_fast()),
            MockUserRepository::new(),
            MockActivityRepository::new(),
            MockEmailProvider::new(),
        )
        .unwrap();
        let app = Router::new()
            .route("/me", get(whoami))
            .with_state(AppState::from_auth(&auth));

        let user = UserId::new();
        let token = auth
            .token_issuer()
            .issue(TokenKind::Access, user, Some(Role::User))
            .unwrap();
        let request = Request::builder()
            .uri("/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token.token.expose_secret()))
            .body(Body::empty())
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, user.to_string().as_bytes());

        let anonymous = Request::builder().uri("/me").body(Body::empty()).unwrap();
        let response = app.oneshot(anonymous).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
