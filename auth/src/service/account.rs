//! Registration, profile updates and email verification.

use super::{AuthService, RegisterRequest, UpdateProfileRequest};
use crate::audit::{ActionType, NewActivity, ResourceType};
use crate::error::{AuthError, Result};
use crate::password::validate_password_strength;
use crate::providers::{ActivityRepository, EmailProvider, Profile, User, UserRepository};
use crate::secret::SecretString;
use crate::state::UserId;
use crate::token::TokenKind;
use crate::utils::{is_valid_email, normalize_email};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{info, instrument};

/// Placeholder written to audit snapshots instead of password material.
const REDACTED: &str = "[REDACTED]";

impl<U, A, E> AuthService<U, A, E>
where
    U: UserRepository,
    A: ActivityRepository,
    E: EmailProvider,
{
    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for a weak password, a malformed
    /// email, a blank username, or an existing username or email; otherwise
    /// the store's error.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest, ip_address: Option<&str>) -> Result<Profile> {
        validate_password_strength(request.password.expose_secret())?;

        let username = request.username.trim().to_string();
        let email = normalize_email(&request.email);
        if username.is_empty() {
            return Err(AuthError::validation("username is required"));
        }
        if !is_valid_email(&email) {
            return Err(AuthError::validation("invalid email address"));
        }

        self.ensure_absent("users.get_by_username", self.users.get_by_username(&username), "username already exists")
            .await?;
        self.ensure_absent("users.get_by_email", self.users.get_by_email(&email), "email already exists")
            .await?;

        let password_hash = self.hasher.hash_blocking(&request.password).await?;
        let user = User::new(
            username,
            email,
            password_hash,
            request.full_name.trim().to_string(),
            request.role,
        );
        let user = self.store("users.create_user", self.users.create_user(&user)).await?;

        self.audit_success(
            NewActivity::new(ActionType::RegisterUser, ResourceType::User)
                .with_actor(Some(user.id), user.username.as_str())
                .with_resource_id(user.id)
                .with_ip(ip_address)
                .with_details(format!("New user registered: {}", user.username))
                .with_change(
                    None,
                    Some(serde_json::json!({
                        "username": user.username,
                        "email": user.email,
                        "role": user.role,
                    })),
                ),
        )
        .await?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user.profile())
    }

    /// Apply the fields present in `request` that differ from the stored
    /// values.
    ///
    /// When nothing differs, nothing is written or audited and the current
    /// profile is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown user,
    /// [`AuthError::Validation`] for a malformed or taken email or a weak
    /// password, or the store's error.
    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        request: UpdateProfileRequest,
        ip_address: Option<&str>,
    ) -> Result<Profile> {
        let mut user = self.store("users.get_by_id", self.users.get_by_id(user_id)).await?;

        let mut old = Map::new();
        let mut new = Map::new();

        if let Some(email) = request.email.as_deref().map(normalize_email) {
            if email != user.email {
                if !is_valid_email(&email) {
                    return Err(AuthError::validation("invalid email address"));
                }
                match self.store("users.get_by_email", self.users.get_by_email(&email)).await {
                    Ok(other) if other.id != user.id => {
                        return Err(AuthError::validation("email already exists"));
                    }
                    Ok(_) | Err(AuthError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                old.insert("email".into(), Value::String(user.email.clone()));
                new.insert("email".into(), Value::String(email.clone()));
                user.email = email;
            }
        }

        if let Some(full_name) = request.full_name {
            if full_name != user.full_name {
                old.insert("full_name".into(), Value::String(user.full_name.clone()));
                new.insert("full_name".into(), Value::String(full_name.clone()));
                user.full_name = full_name;
            }
        }

        if let Some(password) = request.password.filter(|p| !p.is_empty()) {
            if !self.hasher.verify_blocking(&password, &user.password_hash).await? {
                validate_password_strength(password.expose_secret())?;
                user.password_hash = self.hasher.hash_blocking(&password).await?;
                old.insert("password".into(), Value::String(REDACTED.into()));
                new.insert("password".into(), Value::String(REDACTED.into()));
            }
        }

        if new.is_empty() {
            return Ok(user.profile());
        }

        user.updated_at = Utc::now();
        self.store("users.update", self.users.update(&user)).await?;

        let changed: Vec<&str> = new.keys().map(String::as_str).collect();
        let details = format!("User profile updated. Changed fields: {}", changed.join(", "));
        self.audit_success(
            NewActivity::new(ActionType::UpdateProfile, ResourceType::User)
                .with_actor(Some(user.id), user.username.as_str())
                .with_resource_id(user.id)
                .with_ip(ip_address)
                .with_details(details)
                .with_change(Some(Value::Object(old)), Some(Value::Object(new))),
        )
        .await?;

        info!(user_id = %user.id, "Profile updated");
        Ok(user.profile())
    }

    /// Confirm email ownership with an `email_verify` token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for an invalid token or unknown
    /// subject, [`AuthError::Validation`] if already verified, or the
    /// store's error.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &SecretString, ip_address: Option<&str>) -> Result<Profile> {
        let claims = self
            .tokens
            .validate_kind(token.expose_secret(), TokenKind::EmailVerify)?;
        let mut user = self.subject_of(claims.sub, "verification").await?;

        if user.email_verified {
            return Err(AuthError::validation("email already verified"));
        }

        user.email_verified = true;
        user.updated_at = Utc::now();
        self.store("users.update", self.users.update(&user)).await?;

        self.audit_success(
            NewActivity::new(ActionType::EmailVerified, ResourceType::User)
                .with_actor(Some(user.id), user.username.as_str())
                .with_resource_id(user.id)
                .with_ip(ip_address)
                .with_details(format!("Email verified: {}", user.email)),
        )
        .await?;

        Ok(user.profile())
    }

    /// Email a verification link to the user.
    ///
    /// Returns the link's expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown user,
    /// [`AuthError::Validation`] if already verified, or the delivery or
    /// store error.
    #[instrument(skip(self))]
    pub async fn request_email_verification(&self, user_id: UserId) -> Result<DateTime<Utc>> {
        let user = self.store("users.get_by_id", self.users.get_by_id(user_id)).await?;
        if user.email_verified {
            return Err(AuthError::validation("email already verified"));
        }

        let issued = self.tokens.issue(TokenKind::EmailVerify, user.id, None)?;
        let link = self.link("verify-email", &issued.token);
        self.email
            .send_verification_email(&user.email, &link, issued.expires_at())
            .await?;

        info!(user_id = %user.id, "Verification email sent");
        Ok(issued.expires_at())
    }

    /// Load the subject of a single-purpose token. Unknown subjects are an
    /// authentication failure, not a 404.
    pub(super) async fn subject_of(&self, user_id: UserId, purpose: &str) -> Result<User> {
        match self.store("users.get_by_id", self.users.get_by_id(user_id)).await {
            Ok(user) => Ok(user),
            Err(AuthError::NotFound(_)) => Err(AuthError::unauthorized(format!(
                "user not found for {purpose} token"
            ))),
            Err(e) => Err(e),
        }
    }

    /// `{frontend_base_url}/{path}?token=...`
    pub(super) fn link(&self, path: &str, token: &SecretString) -> String {
        format!(
            "{}/{path}?token={}",
            self.config.frontend_base_url.trim_end_matches('/'),
            urlencoding::encode(token.expose_secret())
        )
    }

    async fn ensure_absent<F>(&self, operation: &'static str, lookup: F, message: &str) -> Result<()>
    where
        F: std::future::Future<Output = Result<User>>,
    {
        match self.store(operation, lookup).await {
            Ok(_) => Err(AuthError::validation(message)),
            Err(AuthError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
