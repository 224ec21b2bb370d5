//! Error types for booking operations.

use thiserror::Error;
use ticketbook_auth::AuthError;
use ticketbook_auth::deadline::DeadlineExceeded;

/// Result type alias for booking operations.
pub type Result<T> = std::result::Result<T, BookingError>;

/// Error taxonomy for event and ticket flows.
///
/// Status classes and codes line up with [`AuthError`] so the web layer can
/// render both the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Input failed validation.
    #[error("{message}")]
    Validation {
        /// Summary of the failure.
        message: String,
        /// One entry per failed rule.
        details: Vec<String>,
    },

    /// Requested event or ticket does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Persistence call failed or exceeded its deadline.
    #[error("Database error: {0}")]
    Database(String),

    /// Audit, serialization or any other internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Validation error without per-rule details.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// The error returned when a mutation's audit entry cannot be written.
    #[must_use]
    pub fn audit_failed() -> Self {
        Self::Internal("failed to log activity".to_string())
    }

    /// HTTP status class for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound(_) => 404,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Stable machine readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to a client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    /// Per-rule validation failures, empty for other variants.
    #[must_use]
    pub fn details(&self) -> &[String] {
        match self {
            Self::Validation { details, .. } => details,
            _ => &[],
        }
    }
}

impl From<DeadlineExceeded> for BookingError {
    fn from(err: DeadlineExceeded) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<AuthError> for BookingError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation { message, details } => Self::Validation { message, details },
            AuthError::NotFound(message) => Self::NotFound(message),
            AuthError::DatabaseError(message) => Self::Database(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn deadline_maps_to_database_error() {
        let err = BookingError::from(DeadlineExceeded {
            operation: "booking.get_event",
            limit: Duration::from_millis(10),
        });
        assert_eq!(err.code(), "DATABASE_ERROR");
        assert_eq!(err.public_message(), "An internal error occurred");
    }

    #[test]
    fn auth_validation_keeps_details() {
        let err = BookingError::from(AuthError::validation_with(
            "bad",
            vec!["one".to_string()],
        ));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.details(), ["one".to_string()]);
    }
}
