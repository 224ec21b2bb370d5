//! Authentication configuration.
//!
//! Values are provided by the application at startup. Nothing here is read
//! from process-global state after construction; the signing secret in
//! particular is injected, never looked up lazily.

use crate::secret::SecretString;
use chrono::Duration;
use std::env;

/// What happens when an audit append fails after a successful auth flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditPolicy {
    /// Log and count the failure, return the flow's result unchanged.
    #[default]
    BestEffort,
    /// Surface the failure as an internal error.
    ///
    /// The primary mutation has already been persisted; pure auth flows run
    /// without a transaction.
    Required,
}

/// Token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    /// Access token lifetime. Default: 180 minutes.
    pub access: Duration,
    /// Refresh token lifetime. Default: 7 days.
    pub refresh: Duration,
    /// Password reset token lifetime. Default: 1 hour.
    pub reset: Duration,
    /// Email verification token lifetime. Default: 24 hours.
    pub email_verify: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::minutes(180),
            refresh: Duration::days(7),
            reset: Duration::hours(1),
            email_verify: Duration::hours(24),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordConfig {
    /// Memory cost in KiB. Default: 19456 (19 MiB).
    pub memory_kib: u32,
    /// Number of passes. Default: 2.
    pub iterations: u32,
    /// Lanes. Default: 1.
    pub parallelism: u32,
}

impl PasswordConfig {
    /// Cheapest parameters Argon2 accepts. For tests only.
    #[must_use]
    pub const fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Configuration for the auth orchestrator, token issuer and audit trail.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC signing secret for all token kinds.
    pub jwt_secret: SecretString,

    /// Token lifetimes.
    pub ttls: TokenTtls,

    /// Password hashing cost.
    pub password: PasswordConfig,

    /// Upper bound on every persistence call.
    ///
    /// Default: 5 seconds
    pub store_timeout: std::time::Duration,

    /// Audit failure handling for successful flows.
    pub audit_policy: AuditPolicy,

    /// Frontend origin used to build reset and verification links.
    ///
    /// Links are formatted as `{frontend_base_url}/reset-password?token=...`
    pub frontend_base_url: String,
}

impl AuthConfig {
    /// Create configuration with default lifetimes.
    #[must_use]
    pub fn new(jwt_secret: impl Into<SecretString>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ttls: TokenTtls::default(),
            password: PasswordConfig::default(),
            store_timeout: std::time::Duration::from_secs(5),
            audit_policy: AuditPolicy::default(),
            frontend_base_url: "http://localhost:3000".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `JWT_SECRET` is required; everything else falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`](crate::AuthError::InternalError)
    /// when `JWT_SECRET` is missing or empty, or a token lifetime is not a
    /// positive, representable amount.
    pub fn from_env() -> crate::Result<Self> {
        let secret = env::var("JWT_SECRET").unwrap_or_default();
        if secret.is_empty() {
            return Err(crate::AuthError::InternalError(
                "JWT_SECRET must be set".to_string(),
            ));
        }

        let defaults = TokenTtls::default();
        let ttls = TokenTtls {
            access: env_ttl("ACCESS_TOKEN_TTL_MINUTES", defaults.access, Duration::try_minutes)?,
            refresh: env_ttl("REFRESH_TOKEN_TTL_DAYS", defaults.refresh, Duration::try_days)?,
            reset: env_ttl("RESET_TOKEN_TTL_MINUTES", defaults.reset, Duration::try_minutes)?,
            email_verify: env_ttl(
                "EMAIL_VERIFY_TTL_HOURS",
                defaults.email_verify,
                Duration::try_hours,
            )?,
        };

        let mut config = Self::new(secret).with_ttls(ttls);
        if let Some(ms) = env_parse("STORE_TIMEOUT_MS") {
            config.store_timeout = std::time::Duration::from_millis(ms.unsigned_abs());
        }
        if let Ok(url) = env::var("FRONTEND_BASE_URL") {
            config.frontend_base_url = url;
        }
        if env::var("AUDIT_POLICY").is_ok_and(|v| v.eq_ignore_ascii_case("required")) {
            config.audit_policy = AuditPolicy::Required;
        }
        Ok(config)
    }

    /// Set token lifetimes.
    #[must_use]
    pub const fn with_ttls(mut self, ttls: TokenTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Set password hashing cost.
    #[must_use]
    pub const fn with_password(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }

    /// Set the persistence deadline.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the audit failure policy.
    #[must_use]
    pub const fn with_audit_policy(mut self, policy: AuditPolicy) -> Self {
        self.audit_policy = policy;
        self
    }

    /// Set the frontend origin for emailed links.
    #[must_use]
    pub fn with_frontend_base_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_base_url = url.into();
        self
    }
}

fn env_parse(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_ttl(
    key: &str,
    default: Duration,
    unit: fn(i64) -> Option<Duration>,
) -> crate::Result<Duration> {
    ttl_from(key, env_parse(key), default, unit)
}

fn ttl_from(
    key: &str,
    amount: Option<i64>,
    default: Duration,
    unit: fn(i64) -> Option<Duration>,
) -> crate::Result<Duration> {
    match amount {
        None => Ok(default),
        Some(amount) => unit(amount)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| {
                crate::AuthError::InternalError(format!(
                    "{key} must be a positive lifetime, got {amount}"
                ))
            }),
    }
}
