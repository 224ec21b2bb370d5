//! Signed, typed, expiring tokens.
//!
//! All four token kinds are HS256 JWTs signed with the same injected secret.
//! The `kind` claim keeps them apart: a refresh token is never accepted where
//! an access token is expected, and so on. Refresh and reset tokens are only
//! ever persisted as a SHA-256 digest ([`hash_for_storage`]).

use crate::config::TokenTtls;
use crate::error::{AuthError, Result};
use crate::secret::SecretString;
use crate::state::{Role, UserId};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Bearer credential for API calls.
    Access,
    /// Exchanged for a new token pair.
    Refresh,
    /// Authorizes one password reset.
    Reset,
    /// Confirms ownership of an email address.
    EmailVerify,
}

impl TokenKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Reset => "reset",
            Self::EmailVerify => "email_verify",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user.
    pub sub: UserId,
    /// Role, present on access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Token kind.
    pub kind: TokenKind,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
    /// Unique token id, so two tokens minted in the same second differ.
    pub jti: String,
}

impl Claims {
    /// Fail unless this token is of the `expected` kind.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] on a kind mismatch.
    pub fn expect_kind(&self, expected: TokenKind) -> Result<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(AuthError::Unauthorized(format!(
                "expected {expected} token, got {}",
                self.kind
            )))
        }
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS.
    pub token: SecretString,
    /// Claims that were signed.
    pub claims: Claims,
}

impl IssuedToken {
    /// Expiry of the token.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

/// Issues and validates tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttls: TokenTtls,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer for the given secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if the secret is empty.
    pub fn new(secret: &SecretString, ttls: TokenTtls) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::InternalError(
                "token signing secret is empty".to_string(),
            ));
        }
        let bytes = secret.expose_secret().as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            ttls,
        })
    }

    /// Configured lifetimes.
    #[must_use]
    pub const fn ttls(&self) -> &TokenTtls {
        &self.ttls
    }

    /// Default lifetime for a kind.
    #[must_use]
    pub const fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.ttls.access,
            TokenKind::Refresh => self.ttls.refresh,
            TokenKind::Reset => self.ttls.reset,
            TokenKind::EmailVerify => self.ttls.email_verify,
        }
    }

    /// Issue a token with the kind's default lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if signing fails.
    pub fn issue(&self, kind: TokenKind, subject: UserId, role: Option<Role>) -> Result<IssuedToken> {
        self.issue_with_ttl(kind, subject, role, self.ttl_for(kind))
    }

    /// Issue a token with an explicit lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if signing fails or `ttl` puts
    /// the expiry outside the representable range.
    pub fn issue_with_ttl(
        &self,
        kind: TokenKind,
        subject: UserId,
        role: Option<Role>,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            AuthError::InternalError(format!("{kind} token lifetime is out of range"))
        })?;
        let claims = Claims {
            sub: subject,
            role,
            kind,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(format!("Failed to sign {kind} token: {e}")))?;

        Ok(IssuedToken {
            token: SecretString::new(token),
            claims,
        })
    }

    /// Validate signature, algorithm and expiry against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for a bad signature, a non-HMAC
    /// algorithm, a malformed token, or an expired token.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        self.validate_at(token, Utc::now())
    }

    /// Validate against an explicit clock reading.
    ///
    /// A token is expired once `now >= exp` (second granularity).
    ///
    /// # Errors
    ///
    /// See [`Self::validate`].
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Expiry is checked below with an inclusive boundary and no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                AuthError::unauthorized("invalid token")
            })?
            .claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::unauthorized("token has expired"));
        }

        Ok(claims)
    }

    /// Validate and require a specific kind.
    ///
    /// # Errors
    ///
    /// See [`Self::validate`]; additionally [`AuthError::Unauthorized`] on a
    /// kind mismatch.
    pub fn validate_kind(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let claims = self.validate(token)?;
        claims.expect_kind(expected)?;
        Ok(claims)
    }
}

/// SHA-256 digest of a token, lowercase hex.
///
/// # Examples
///
/// ```
/// # use ticketbook_auth::token::hash_for_storage;
/// let digest = hash_for_storage("abc");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_for_storage("abc"));
/// ```
#[must_use]
pub fn hash_for_storage(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Constant-time comparison of a stored digest with a presented token.
#[must_use]
pub fn digest_matches(stored_digest: &str, token: &str) -> bool {
    constant_time_eq::constant_time_eq(
        stored_digest.as_bytes(),
        hash_for_storage(token).as_bytes(),
    )
}
