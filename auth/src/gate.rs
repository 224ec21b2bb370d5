//! Per-request access control.

use crate::error::{AuthError, Result};
use crate::state::{Role, UserId};
use crate::token::{TokenIssuer, TokenKind};
use serde::Serialize;
use std::sync::Arc;

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Caller's user ID.
    pub user_id: UserId,
    /// Caller's role at token issuance.
    pub role: Role,
}

/// Bearer token verification and role checks.
#[derive(Debug, Clone)]
pub struct AccessGate {
    tokens: Arc<TokenIssuer>,
}

impl AccessGate {
    /// Create a gate over a shared issuer.
    #[must_use]
    pub const fn new(tokens: Arc<TokenIssuer>) -> Self {
        Self { tokens }
    }

    /// Authenticate from the raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] if the header is missing, not a
    /// `Bearer` credential, or does not hold a valid access token.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<Principal> {
        let header =
            authorization.ok_or_else(|| AuthError::unauthorized("authorization header required"))?;
        let token = bearer_token(header)
            .ok_or_else(|| AuthError::unauthorized("authorization header must be a Bearer token"))?;
        self.verify(token)
    }

    /// Resolve an access token to its principal.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for an invalid, expired or
    /// non-access token, or one carrying no role.
    pub fn verify(&self, token: &str) -> Result<Principal> {
        let claims = self.tokens.validate_kind(token, TokenKind::Access)?;
        let role = claims
            .role
            .ok_or_else(|| AuthError::unauthorized("access token carries no role"))?;

        Ok(Principal {
            user_id: claims.sub,
            role,
        })
    }

    /// Require the principal's role to be one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] otherwise.
    pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<()> {
        if allowed.contains(&principal.role) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %principal.user_id,
                role = %principal.role,
                "Role not permitted for this operation"
            );
            Err(AuthError::Forbidden("insufficient permissions".to_string()))
        }
    }
}

/// Extract the token from a `Bearer <token>` header value.
///
/// # Examples
///
/// ```
/// # use ticketbook_auth::gate::bearer_token;
/// assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
/// assert_eq!(bearer_token("Bearer "), None);
/// ```
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TokenTtls;
    use crate::secret::SecretString;

    fn gate() -> (AccessGate, Arc<TokenIssuer>) {
        let issuer = Arc::new(
            TokenIssuer::new(&SecretString::from("gate-secret"), TokenTtls::default()).unwrap(),
        );
        (AccessGate::new(Arc::clone(&issuer)), issuer)
    }

    #[test]
    fn bearer_access_token_authenticates() {
        let (gate, issuer) = gate();
        let user = UserId::new();
        let token = issuer.issue(TokenKind::Access, user, Some(Role::Admin)).unwrap();
        let header = format!("Bearer {}", token.token.expose_secret());

        let principal = gate.authenticate(Some(&header)).unwrap();
        assert_eq!(principal, Principal { user_id: user, role: Role::Admin });
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        let (gate, _) = gate();
        assert!(matches!(gate.authenticate(None), Err(AuthError::Unauthorized(_))));
        assert!(matches!(gate.authenticate(Some("Token abc")), Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn refresh_token_cannot_be_used_as_bearer() {
        let (gate, issuer) = gate();
        let refresh = issuer.issue(TokenKind::Refresh, UserId::new(), None).unwrap();
        let header = format!("Bearer {}", refresh.token.expose_secret());
        assert!(matches!(gate.authenticate(Some(&header)), Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn role_check() {
        let principal = Principal { user_id: UserId::new(), role: Role::User };
        assert!(AccessGate::authorize(&principal, &[Role::User, Role::Admin]).is_ok());
        assert!(matches!(
            AccessGate::authorize(&principal, &[Role::Admin]),
            Err(AuthError::Forbidden(_))
        ));
    }
}
