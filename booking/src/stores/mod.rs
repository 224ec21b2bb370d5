//! Storage implementations for the booking flows.
//!
//! - **Booking Store** (PostgreSQL) - Events, tickets and in-transaction activity writes

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-exports
#[cfg(feature = "postgres")]
pub use postgres::{PostgresBookingStore, PostgresBookingTransaction};
