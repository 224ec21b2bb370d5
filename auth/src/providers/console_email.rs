//! Console email provider for development.

use crate::error::Result;
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use tracing::info;

/// Console email provider.
///
/// Logs emails instead of sending them. Useful in development where no
/// mail relay is configured.
///
/// # Examples
///
/// ```ignore
/// use ticketbook_auth::providers::{ConsoleEmailProvider, EmailProvider};
///
/// let provider = ConsoleEmailProvider::new();
/// provider.send_password_reset(
///     "user@example.com",
///     "https://tickets.example.com/reset-password?token=abc",
///     Utc::now() + chrono::Duration::hours(1),
/// ).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConsoleEmailProvider;

impl ConsoleEmailProvider {
    /// Create a new console email provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EmailProvider for ConsoleEmailProvider {
    async fn send_password_reset(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let expires_minutes = (expires_at - Utc::now()).num_minutes();

        info!(
            to = %to,
            link = %link,
            expires_in_minutes = expires_minutes,
            "Password reset email (development mode)"
        );

        Ok(())
    }

    async fn send_verification_email(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let expires_hours = (expires_at - Utc::now()).num_hours();

        info!(
            to = %to,
            link = %link,
            expires_in_hours = expires_hours,
            "Email verification email (development mode)"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_delivery_always_succeeds() {
        let provider = ConsoleEmailProvider::new();
        let expires = Utc::now() + chrono::Duration::hours(1);

        assert!(provider
            .send_password_reset("user@example.com", "http://localhost/reset?token=t", expires)
            .await
            .is_ok());
        assert!(provider
            .send_verification_email("user@example.com", "http://localhost/verify?token=t", expires)
            .await
            .is_ok());
    }
}
