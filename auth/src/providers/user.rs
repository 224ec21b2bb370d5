//! User repository trait.

use super::User;
use crate::error::Result;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use std::future::Future;

/// User repository.
///
/// Owns user records and the two per-user token slots (refresh session and
/// password reset). Slots are written only through their dedicated methods;
/// [`UserRepository::update`] never touches them, so a profile write cannot
/// resurrect a revoked session.
pub trait UserRepository: Send + Sync {
    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database query fails
    /// - Username or email already exists → `AuthError::Validation`
    fn create_user(&self, user: &User) -> impl Future<Output = Result<User>> + Send;

    /// Get user by username.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database query fails
    /// - User not found → `AuthError::NotFound`
    fn get_by_username(&self, username: &str) -> impl Future<Output = Result<User>> + Send;

    /// Get user by email.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database query fails
    /// - User not found → `AuthError::NotFound`
    fn get_by_email(&self, email: &str) -> impl Future<Output = Result<User>> + Send;

    /// Get user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database query fails
    /// - User not found → `AuthError::NotFound`
    fn get_by_id(&self, id: UserId) -> impl Future<Output = Result<User>> + Send;

    /// Persist profile columns: email, full name, password hash, role,
    /// active flag, verified flag and `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Database query fails
    /// - User not found → `AuthError::NotFound`
    fn update(&self, user: &User) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite the refresh-token slot.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn save_refresh_token(
        &self,
        id: UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Empty the refresh-token slot.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn clear_refresh_token(&self, id: UserId) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite the password-reset slot.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn save_password_reset_token(
        &self,
        id: UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Empty the password-reset slot.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn clear_password_reset_token(&self, id: UserId) -> impl Future<Output = Result<()>> + Send;

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn update_last_login(
        &self,
        id: UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}
