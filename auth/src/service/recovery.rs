//! Password reset.
//!
//! The reset token is a signed `reset` JWT; only its digest is stored, in
//! the user's single reset slot. Requesting a new link overwrites the slot,
//! completing a reset empties it.

use super::AuthService;
use crate::audit::{ActionType, NewActivity, ResourceType};
use crate::error::{AuthError, Result};
use crate::password::validate_password_strength;
use crate::providers::{ActivityRepository, EmailProvider, UserRepository};
use crate::secret::SecretString;
use crate::token::{TokenKind, digest_matches, hash_for_storage};
use crate::utils::normalize_email;
use chrono::Utc;
use tracing::{error, info, instrument, warn};

impl<U, A, E> AuthService<U, A, E>
where
    U: UserRepository,
    A: ActivityRepository,
    E: EmailProvider,
{
    /// Email a reset link if an account uses `email`.
    ///
    /// Succeeds silently for unknown addresses and when delivery fails, so
    /// the response never reveals whether an account exists.
    ///
    /// # Errors
    ///
    /// Returns store errors other than not-found, or a signing failure.
    #[instrument(skip(self, email))]
    pub async fn send_password_reset(&self, email: &str, ip_address: Option<&str>) -> Result<()> {
        let email = normalize_email(email);
        let user = match self.store("users.get_by_email", self.users.get_by_email(&email)).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                info!("Password reset requested for unknown email");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let issued = self.tokens.issue(TokenKind::Reset, user.id, None)?;
        self.store(
            "users.save_password_reset_token",
            self.users.save_password_reset_token(
                user.id,
                &hash_for_storage(issued.token.expose_secret()),
                issued.expires_at(),
            ),
        )
        .await?;

        self.audit_success(
            NewActivity::new(ActionType::PasswordResetRequest, ResourceType::User)
                .with_actor(Some(user.id), user.username.as_str())
                .with_resource_id(user.id)
                .with_ip(ip_address)
                .with_details("Password reset requested"),
        )
        .await?;

        let link = self.link("reset-password", &issued.token);
        if let Err(e) = self
            .email
            .send_password_reset(&user.email, &link, issued.expires_at())
            .await
        {
            error!(user_id = %user.id, error = %e, "Failed to deliver password reset email");
            metrics::counter!("ticketbook_auth_email_failures_total", "kind" => "password_reset")
                .increment(1);
        }

        Ok(())
    }

    /// Replace the password using a reset token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for a weak password,
    /// [`AuthError::Unauthorized`] for an invalid, superseded, used or
    /// expired token, or the store's error.
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(
        &self,
        token: &SecretString,
        new_password: &SecretString,
        ip_address: Option<&str>,
    ) -> Result<()> {
        validate_password_strength(new_password.expose_secret())?;

        let presented = token.expose_secret();
        let claims = self.tokens.validate_kind(presented, TokenKind::Reset)?;
        let mut user = self.subject_of(claims.sub, "reset").await?;

        let matches = user
            .password_reset_token_hash
            .as_deref()
            .is_some_and(|stored| digest_matches(stored, presented));
        if !matches {
            warn!(user_id = %user.id, "Reset token does not match the outstanding one");
            return Err(AuthError::unauthorized("invalid or already used reset token"));
        }

        if user
            .password_reset_expires_at
            .is_none_or(|expires_at| expires_at < Utc::now())
        {
            if let Err(e) = self
                .store(
                    "users.clear_password_reset_token",
                    self.users.clear_password_reset_token(user.id),
                )
                .await
            {
                warn!(user_id = %user.id, error = %e, "Failed to clear expired reset token");
            }
            return Err(AuthError::unauthorized("reset token has expired"));
        }

        user.password_hash = self.hasher.hash_blocking(new_password).await?;
        user.updated_at = Utc::now();

        self.store(
            "users.clear_password_reset_token",
            self.users.clear_password_reset_token(user.id),
        )
        .await?;
        self.store("users.update", self.users.update(&user)).await?;

        self.audit_success(
            NewActivity::new(ActionType::PasswordReset, ResourceType::User)
                .with_actor(Some(user.id), user.username.as_str())
                .with_resource_id(user.id)
                .with_ip(ip_address)
                .with_details("Password reset completed"),
        )
        .await?;

        info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}
