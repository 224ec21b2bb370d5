//! Login, refresh rotation and logout.
//!
//! A user has at most one live refresh token; its SHA-256 digest sits in the
//! user record. Login and refresh overwrite the slot, logout empties it.
//! Concurrent login/refresh/logout for the same user race on that slot and
//! the last writer wins.

use super::{AuthService, LoginRequest, LoginResponse, TokenPair};
use crate::audit::{ActionType, NewActivity, ResourceType};
use crate::error::{AuthError, Result};
use crate::providers::{ActivityRepository, EmailProvider, User, UserRepository};
use crate::secret::SecretString;
use crate::token::{TokenKind, digest_matches, hash_for_storage};
use chrono::Utc;
use tracing::{info, instrument, warn};

impl<U, A, E> AuthService<U, A, E>
where
    U: UserRepository,
    A: ActivityRepository,
    E: EmailProvider,
{
    /// Authenticate with username and password.
    ///
    /// Every rejection records a `failed_login_attempt` entry; the entry for
    /// an unknown username has no user id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] with `"account not found"`,
    /// `"account is disabled"` or `"invalid credentials"`, or a store error.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(
        &self,
        request: LoginRequest,
        ip_address: Option<&str>,
    ) -> Result<LoginResponse> {
        let user = match self
            .store("users.get_by_username", self.users.get_by_username(&request.username))
            .await
        {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                self.reject_login(
                    NewActivity::new(ActionType::FailedLoginAttempt, ResourceType::User)
                        .with_actor(None, request.username.as_str())
                        .with_details(format!(
                            "Failed login attempt: account not found for username '{}'",
                            request.username
                        )),
                    ip_address,
                    "account_not_found",
                )
                .await;
                return Err(AuthError::unauthorized("account not found"));
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            self.reject_login(
                failed_attempt(&user, "Failed login attempt: account is disabled"),
                ip_address,
                "account_disabled",
            )
            .await;
            return Err(AuthError::unauthorized("account is disabled"));
        }

        if !self
            .hasher
            .verify_blocking(&request.password, &user.password_hash)
            .await?
        {
            self.reject_login(
                failed_attempt(&user, "Failed login attempt: invalid credentials"),
                ip_address,
                "invalid_credentials",
            )
            .await;
            return Err(AuthError::unauthorized("invalid credentials"));
        }

        let tokens = self.start_session(&user).await?;

        let now = Utc::now();
        if let Err(e) = self
            .store("users.update_last_login", self.users.update_last_login(user.id, now))
            .await
        {
            warn!(user_id = %user.id, error = %e, "Failed to update last login");
        }

        self.audit_success(
            NewActivity::new(ActionType::Login, ResourceType::User)
                .with_actor(Some(user.id), user.username.as_str())
                .with_resource_id(user.id)
                .with_ip(ip_address)
                .with_details("User logged in successfully"),
        )
        .await?;

        info!(user_id = %user.id, "User logged in");

        let mut profile = user.profile();
        profile.last_login_at = Some(now);
        Ok(LoginResponse { tokens, profile })
    }

    /// Exchange a refresh token for a new pair, revoking the old one.
    ///
    /// Presenting a token that no longer matches the stored digest (for
    /// example one that was already rotated) clears the live session too.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for an invalid, mismatched or
    /// expired refresh token, an unknown user or a disabled account.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(
        &self,
        refresh_token: &SecretString,
        ip_address: Option<&str>,
    ) -> Result<TokenPair> {
        let presented = refresh_token.expose_secret();
        let claims = self
            .tokens
            .validate_kind(presented, TokenKind::Refresh)
            .map_err(|e| AuthError::unauthorized(format!("invalid refresh token: {e}")))?;

        let user = match self
            .store("users.get_by_id", self.users.get_by_id(claims.sub))
            .await
        {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                return Err(AuthError::unauthorized("user not found for refresh token"));
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            return Err(AuthError::unauthorized("account is disabled"));
        }

        let matches = user
            .refresh_token_hash
            .as_deref()
            .is_some_and(|stored| digest_matches(stored, presented));
        if !matches {
            warn!(user_id = %user.id, "Refresh token does not match the live session");
            self.end_session_quietly(&user).await;
            return Err(AuthError::unauthorized("invalid or revoked refresh token"));
        }

        if user
            .refresh_token_expires_at
            .is_none_or(|expires_at| expires_at < Utc::now())
        {
            self.end_session_quietly(&user).await;
            return Err(AuthError::unauthorized("refresh token expired in database"));
        }

        let tokens = self.start_session(&user).await?;

        self.audit_success(
            NewActivity::new(ActionType::TokenRefresh, ResourceType::User)
                .with_actor(Some(user.id), user.username.as_str())
                .with_resource_id(user.id)
                .with_ip(ip_address)
                .with_details("Access token refreshed"),
        )
        .await?;

        Ok(tokens)
    }

    /// End the caller's session.
    ///
    /// The session slot is cleared whether or not the presented token is the
    /// one currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] if `refresh_token` is not a valid
    /// refresh token, or the store's error.
    #[instrument(skip(self, refresh_token))]
    pub async fn logout(&self, refresh_token: &SecretString, ip_address: Option<&str>) -> Result<()> {
        let claims = self
            .tokens
            .validate_kind(refresh_token.expose_secret(), TokenKind::Refresh)
            .map_err(|e| AuthError::unauthorized(format!("invalid token provided for logout: {e}")))?;

        self.store("users.clear_refresh_token", self.users.clear_refresh_token(claims.sub))
            .await?;

        let username = self.username_or_unknown(claims.sub).await;
        self.audit_success(
            NewActivity::new(ActionType::Logout, ResourceType::User)
                .with_actor(Some(claims.sub), username)
                .with_resource_id(claims.sub)
                .with_ip(ip_address)
                .with_details("User logged out"),
        )
        .await?;

        info!(user_id = %claims.sub, "User logged out");
        Ok(())
    }

    /// Issue a token pair and store the refresh digest, replacing any
    /// previous session.
    async fn start_session(&self, user: &User) -> Result<TokenPair> {
        let access = self
            .tokens
            .issue(TokenKind::Access, user.id, Some(user.role))?;
        let refresh = self.tokens.issue(TokenKind::Refresh, user.id, None)?;

        self.store(
            "users.save_refresh_token",
            self.users.save_refresh_token(
                user.id,
                &hash_for_storage(refresh.token.expose_secret()),
                refresh.expires_at(),
            ),
        )
        .await?;

        Ok(TokenPair {
            access_expires_at: access.expires_at(),
            refresh_expires_at: refresh.expires_at(),
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
        })
    }

    async fn end_session_quietly(&self, user: &User) {
        if let Err(e) = self
            .store("users.clear_refresh_token", self.users.clear_refresh_token(user.id))
            .await
        {
            warn!(user_id = %user.id, error = %e, "Failed to clear refresh token");
        }
    }

    async fn reject_login(&self, entry: NewActivity, ip_address: Option<&str>, reason: &'static str) {
        metrics::counter!("ticketbook_auth_login_failures_total", "reason" => reason).increment(1);
        warn!(username = %entry.username, reason, "Login rejected");
        self.audit_failure(entry.with_ip(ip_address)).await;
    }
}

fn failed_attempt(user: &User, details: &str) -> NewActivity {
    NewActivity::new(ActionType::FailedLoginAttempt, ResourceType::User)
        .with_actor(Some(user.id), user.username.as_str())
        .with_resource_id(user.id)
        .with_details(details)
}
