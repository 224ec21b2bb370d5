//! Auth orchestrator.
//!
//! [`AuthService`] composes the credential verifier, token issuer, user
//! store and activity trail into the account and session flows. It is
//! generic over its providers so the same code runs against the in-memory
//! mocks and against PostgreSQL.
//!
//! Flow families live in submodules:
//!
//! - `account`: register, profile updates, email verification
//! - `session`: login, refresh rotation, logout
//! - `recovery`: password reset request and completion
//!
//! Every store call is bounded by [`AuthConfig::store_timeout`]. Audit writes
//! after a successful mutation follow [`AuthConfig::audit_policy`]; audit
//! writes on a failure branch are always best-effort so they never mask the
//! original error.

mod account;
mod recovery;
mod session;

use crate::audit::{ActivityLogContext, ActivityTrail, NewActivity};
use crate::config::{AuditPolicy, AuthConfig};
use crate::deadline::with_deadline;
use crate::error::{AuthError, Result};
use crate::gate::{AccessGate, Principal};
use crate::password::PasswordHasher;
use crate::providers::{ActivityRepository, EmailProvider, Profile, UserRepository};
use crate::secret::SecretString;
use crate::state::{Role, UserId};
use crate::token::TokenIssuer;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;

/// Username recorded when the actor cannot be resolved.
pub const UNKNOWN_USERNAME: &str = "unknown";

/// New account request.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Plain password.
    pub password: SecretString,
    /// Display name.
    pub full_name: String,
    /// Requested role.
    #[serde(default)]
    pub role: Role,
}

/// Credential login request.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Plain password.
    pub password: SecretString,
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    /// New email address.
    pub email: Option<String>,
    /// New display name.
    pub full_name: Option<String>,
    /// New password.
    pub password: Option<SecretString>,
}

/// Access and refresh token issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Bearer credential.
    pub access_token: SecretString,
    /// Rotation credential. Only its digest is stored.
    pub refresh_token: SecretString,
    /// Always `"Bearer"`.
    pub token_type: &'static str,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    /// Issued tokens.
    pub tokens: TokenPair,
    /// Logged-in user.
    pub profile: Profile,
}

/// Authentication and session orchestrator.
pub struct AuthService<U, A, E> {
    users: U,
    audit: ActivityTrail<A>,
    email: E,
    tokens: Arc<TokenIssuer>,
    hasher: PasswordHasher,
    config: AuthConfig,
}

impl<U, A, E> std::fmt::Debug for AuthService<U, A, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("audit_policy", &self.config.audit_policy)
            .field("store_timeout", &self.config.store_timeout)
            .finish_non_exhaustive()
    }
}

impl<U, A, E> AuthService<U, A, E>
where
    U: UserRepository,
    A: ActivityRepository,
    E: EmailProvider,
{
    /// Wire the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if the signing secret is empty or
    /// the password cost parameters are rejected.
    pub fn new(config: AuthConfig, users: U, activities: A, email: E) -> Result<Self> {
        let tokens = Arc::new(TokenIssuer::new(&config.jwt_secret, config.ttls)?);
        let hasher = PasswordHasher::new(config.password)?;
        let audit = ActivityTrail::new(activities, config.store_timeout);

        Ok(Self {
            users,
            audit,
            email,
            tokens,
            hasher,
            config,
        })
    }

    /// The shared token issuer.
    #[must_use]
    pub fn token_issuer(&self) -> Arc<TokenIssuer> {
        Arc::clone(&self.tokens)
    }

    /// Access gate backed by this orchestrator's issuer.
    #[must_use]
    pub fn access_gate(&self) -> AccessGate {
        AccessGate::new(self.token_issuer())
    }

    /// The activity trail this orchestrator writes to.
    #[must_use]
    pub const fn audit(&self) -> &ActivityTrail<A> {
        &self.audit
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Resolve an access token to its principal.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] unless `token` is a valid,
    /// unexpired access token carrying a role.
    pub fn verify_token(&self, token: &str) -> Result<Principal> {
        self.access_gate().verify(token)
    }

    /// Public profile of a user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown user, or the store's
    /// error.
    pub async fn get_profile(&self, user_id: UserId) -> Result<Profile> {
        let user = self
            .store("users.get_by_id", self.users.get_by_id(user_id))
            .await?;
        Ok(user.profile())
    }

    /// Attribution bundle for a request made by `principal`.
    ///
    /// Falls back to [`UNKNOWN_USERNAME`] if the user cannot be loaded.
    pub async fn log_context(
        &self,
        principal: &Principal,
        ip_address: Option<String>,
    ) -> ActivityLogContext {
        let username = self.username_or_unknown(principal.user_id).await;
        ActivityLogContext::new(principal.user_id, username, ip_address)
    }

    async fn username_or_unknown(&self, user_id: UserId) -> String {
        match self.store("users.get_by_id", self.users.get_by_id(user_id)).await {
            Ok(user) => user.username,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not resolve username for audit");
                UNKNOWN_USERNAME.to_string()
            }
        }
    }

    /// Bound a store call by the configured deadline.
    async fn store<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(self.config.store_timeout, operation, fut).await
    }

    /// Audit a successful mutation according to the configured policy.
    async fn audit_success(&self, entry: NewActivity) -> Result<()> {
        match self.config.audit_policy {
            AuditPolicy::BestEffort => {
                self.audit.record(entry).await;
                Ok(())
            }
            AuditPolicy::Required => {
                let action = entry.action;
                self.audit.append(entry).await.map(|_| ()).map_err(|e| {
                    tracing::error!(action = %action, error = %e, "Required audit write failed");
                    AuthError::InternalError("failed to log activity".to_string())
                })
            }
        }
    }

    /// Audit a rejected request. Never fails.
    async fn audit_failure(&self, entry: NewActivity) {
        self.audit.record(entry).await;
    }
}
