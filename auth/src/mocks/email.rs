//! Mock email provider for testing.

use super::poisoned;
use crate::error::{AuthError, Result};
use crate::providers::EmailProvider;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// One captured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Recipient.
    pub to: String,
    /// `"password_reset"` or `"verification"`.
    pub kind: &'static str,
    /// Link included in the message.
    pub link: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

impl SentEmail {
    /// The `token` query parameter of the link, decoded.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        let (_, query) = self.link.split_once("token=")?;
        let raw = query.split('&').next()?;
        urlencoding::decode(raw).ok().map(std::borrow::Cow::into_owned)
    }
}

/// Mock email provider.
///
/// Captures messages instead of sending them.
#[derive(Debug, Clone)]
pub struct MockEmailProvider {
    /// Whether to simulate success or failure.
    pub should_succeed: bool,
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl MockEmailProvider {
    /// Create a new mock email provider that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            should_succeed: true,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock whose deliveries all fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            should_succeed: false,
            ..Self::new()
        }
    }

    /// Messages captured so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recent message to `to`.
    #[must_use]
    pub fn last_to(&self, to: &str) -> Option<SentEmail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }

    fn capture(
        &self,
        to: &str,
        kind: &'static str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send + use<> {
        let sent = Arc::clone(&self.sent);
        let should_succeed = self.should_succeed;
        let message = SentEmail {
            to: to.to_string(),
            kind,
            link: link.to_string(),
            expires_at,
        };

        async move {
            if !should_succeed {
                return Err(AuthError::InternalError("email delivery failed".to_string()));
            }
            sent.lock().map_err(poisoned)?.push(message);
            Ok(())
        }
    }
}

impl Default for MockEmailProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailProvider for MockEmailProvider {
    fn send_password_reset(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        self.capture(to, "password_reset", link, expires_at)
    }

    fn send_verification_email(
        &self,
        to: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        self.capture(to, "verification", link, expires_at)
    }
}
