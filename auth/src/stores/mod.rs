//! Storage implementations for the auth core.
//!
//! - **User Repository** (PostgreSQL) - Accounts plus the refresh and reset token slots
//! - **Activity Repository** (PostgreSQL) - Append-only activity log

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-exports
#[cfg(feature = "postgres")]
pub use postgres::{PostgresActivityRepository, PostgresUserRepository};
