//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of all provider traits
//! for use in unit and integration tests. Each mock can inject failures or
//! latency so error paths are testable without a database.

pub mod activity;
pub mod email;
pub mod user;

pub use activity::MockActivityRepository;
pub use email::{MockEmailProvider, SentEmail};
pub use user::MockUserRepository;

use crate::error::AuthError;

fn poisoned<T>(_: T) -> AuthError {
    AuthError::InternalError("mock state lock poisoned".to_string())
}
