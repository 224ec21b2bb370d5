//! Email provider trait.

use crate::error::Result;
use chrono::{DateTime, Utc};

/// Email provider.
///
/// This trait abstracts over email delivery services
/// (SMTP relay, SES, Postmark, etc.).
pub trait EmailProvider: Send + Sync {
    /// Send a password reset link.
    ///
    /// # Arguments
    ///
    /// - `to`: Recipient email address
    /// - `link`: Full reset URL including the token
    /// - `expires_at`: Token expiration timestamp
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Email provider rejects the request
    fn send_password_reset(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Send an email verification link.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Email provider rejects the request
    fn send_verification_email(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
