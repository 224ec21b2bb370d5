//! Error types for authentication, session and audit operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the authentication core.
///
/// Every variant maps to one HTTP status class and one stable machine
/// readable code (see [`AuthError::status_code`] and [`AuthError::code`]).
/// Infrastructure variants carry diagnostic text that must never reach a
/// client; use [`AuthError::public_message`] when rendering a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Client Errors
    // ═══════════════════════════════════════════════════════════

    /// Input failed validation.
    #[error("{message}")]
    Validation {
        /// Summary of the failure.
        message: String,
        /// One entry per failed rule, in a stable order.
        details: Vec<String>,
    },

    /// Credentials or token were rejected.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated principal lacks the required role.
    #[error("{0}")]
    Forbidden(String),

    /// Requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Persistence call failed or exceeded its deadline.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Hashing, signing or any other internal failure.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Validation error without per-rule details.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Validation error listing every failed rule.
    #[must_use]
    pub fn validation_with(message: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    /// Authentication failure.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// HTTP status class for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticketbook_auth::AuthError;
    /// assert_eq!(AuthError::unauthorized("invalid credentials").status_code(), 401);
    /// assert_eq!(AuthError::DatabaseError("pool closed".into()).status_code(), 500);
    /// ```
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::DatabaseError(_) | Self::InternalError(_) => 500,
        }
    }

    /// Stable machine readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to a client.
    ///
    /// Infrastructure failures collapse to a generic sentence so that
    /// driver errors, SQL fragments or signing failures never leak.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Per-rule validation details, empty for other kinds.
    #[must_use]
    pub fn details(&self) -> &[String] {
        match self {
            Self::Validation { details, .. } => details,
            _ => &[],
        }
    }

    /// Returns `true` if this error is due to invalid user input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticketbook_auth::AuthError;
    /// assert!(AuthError::validation("bad email").is_user_error());
    /// assert!(!AuthError::InternalError("boom".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Unauthorized(_) | Self::Forbidden(_) | Self::NotFound(_)
        )
    }
}

impl From<crate::deadline::DeadlineExceeded> for AuthError {
    fn from(err: crate::deadline::DeadlineExceeded) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_details_are_hidden() {
        let err = AuthError::DatabaseError("relation \"users\" does not exist".to_string());
        assert_eq!(err.public_message(), "An internal error occurred");
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[test]
    fn validation_carries_details() {
        let err = AuthError::validation_with(
            "password requirements not met",
            vec!["uppercase letter".to_string()],
        );
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.details(), ["uppercase letter".to_string()]);
        assert_eq!(err.public_message(), "password requirements not met");
    }
}
