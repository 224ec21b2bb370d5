//! Axum boundary glue for the ticket booking backend.
//!
//! This crate holds only what sits between HTTP and the auth and booking
//! cores:
//!
//! - [`AppError`]: one error type for handlers, rendering auth and booking
//!   errors as `{code, message, details?}` JSON with their status class
//! - [`extractors`]: client IP, correlation ID, user agent, bearer token, and
//!   the access-control extractors [`AuthenticatedUser`] / [`RequireAdmin`]
//!
//! # Request Flow
//!
//! 1. **Extractors** authenticate the bearer token through the
//!    [`AccessGate`](ticketbook_auth::AccessGate) and check roles
//! 2. **Handler** builds an activity context from the principal and
//!    [`ClientIp`], then calls the auth or booking orchestrator
//! 3. **Errors** map to HTTP responses through [`AppError`]

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{
    AuthenticatedUser, BearerToken, CORRELATION_ID_HEADER, ClientIp, CorrelationId, HasAccessGate,
    RequireAdmin, UserAgent,
};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
