//! Persistence and delivery providers.
//!
//! This module defines traits for every external collaborator of the auth
//! core. Orchestrators are generic over these traits, so tests run against
//! the in-memory mocks and production runs against PostgreSQL.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ AuthService      │────▶│ UserRepository   │     │ EmailProvider    │
//! │ (orchestrator)   │     │ users + sessions │     │ reset / verify   │
//! └────────┬─────────┘     └──────────────────┘     └──────────────────┘
//!          │                                                ▲
//!          ▼                                                │
//! ┌──────────────────┐     ┌──────────────────┐            │
//! │ ActivityTrail    │────▶│ ActivityRepo     │     (links delivered
//! │ (audit rules)    │     │ append-only log  │      after issuance)
//! └──────────────────┘     └──────────────────┘
//! ```

use crate::state::{Role, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub mod activity;
pub mod console_email;
pub mod email;
pub mod user;

pub use activity::ActivityRepository;
pub use console_email::ConsoleEmailProvider;
pub use email::EmailProvider;
pub use user::UserRepository;

/// User record.
///
/// Holds at most one refresh-token digest and one password-reset digest:
/// issuing a new token of either kind overwrites the previous one.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Display name.
    pub full_name: String,
    /// Authorization role.
    pub role: Role,
    /// Disabled accounts cannot log in or refresh.
    pub is_active: bool,
    /// Email ownership confirmed.
    pub email_verified: bool,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// SHA-256 digest of the live refresh token.
    pub refresh_token_hash: Option<String>,
    /// Expiry of the live refresh token.
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    /// SHA-256 digest of the outstanding reset token.
    pub password_reset_token_hash: Option<String>,
    /// Expiry of the outstanding reset token.
    pub password_reset_expires_at: Option<DateTime<Utc>>,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
    /// Last profile change.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New active, unverified user with no session.
    #[must_use]
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        full_name: String,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            username,
            email,
            password_hash,
            full_name,
            role,
            is_active: true,
            email_verified: false,
            last_login_at: None,
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            password_reset_token_hash: None,
            password_reset_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public view of this user.
    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            is_active: self.is_active,
            email_verified: self.email_verified,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .field("email_verified", &self.email_verified)
            .field("has_session", &self.refresh_token_hash.is_some())
            .finish_non_exhaustive()
    }
}

/// User data safe to return to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// User ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role.
    pub role: Role,
    /// Active flag.
    pub is_active: bool,
    /// Email verified flag.
    pub email_verified: bool,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
    /// Last profile change.
    pub updated_at: DateTime<Utc>,
}
