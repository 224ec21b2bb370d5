//! # Ticketbook Authentication & Activity Audit
//!
//! Account and session lifecycle for the ticket booking backend, plus the
//! activity audit trail every other component writes to.
//!
//! ## Features
//!
//! - **Credentials**: Argon2id password hashing with a strength policy
//! - **Sessions**: short-lived access JWTs and rotating refresh tokens,
//!   one live refresh token per user, stored as a digest
//! - **Recovery**: single-use, time-boxed password reset and email
//!   verification links
//! - **Access control**: bearer-token authentication and role checks
//! - **Audit trail**: append-only activity log with filtering, summaries,
//!   security alerts and retention cleanup
//! - **Testable**: in-memory providers behind the `test-utils` feature
//!
//! ## Architecture
//!
//! ```text
//! AuthService ──► UserRepository      (accounts, token slots)
//!      │     ──► ActivityTrail ──► ActivityRepository
//!      │     ──► EmailProvider
//!      └────► TokenIssuer ◄── AccessGate (request authentication)
//! ```
//!
//! ## Example: Register and log in
//!
//! ```
//! use ticketbook_auth::mocks::{MockActivityRepository, MockEmailProvider, MockUserRepository};
//! use ticketbook_auth::{AuthConfig, AuthService, LoginRequest, PasswordConfig, RegisterRequest, Role};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::new("change-me").with_password(PasswordConfig::insecure_fast());
//! let auth = AuthService::new(
//!     config,
//!     MockUserRepository::new(),
//!     MockActivityRepository::new(),
//!     MockEmailProvider::new(),
//! )?;
//!
//! auth.register(
//!     RegisterRequest {
//!         username: "alice".into(),
//!         email: "alice@example.com".into(),
//!         password: "Str0ng!Passw0rd".into(),
//!         full_name: "Alice".into(),
//!         role: Role::User,
//!     },
//!     Some("203.0.113.7"),
//! )
//! .await?;
//!
//! let login = auth
//!     .login(
//!         LoginRequest { username: "alice".into(), password: "Str0ng!Passw0rd".into() },
//!         Some("203.0.113.7"),
//!     )
//!     .await?;
//!
//! let principal = auth.verify_token(login.tokens.access_token.expose_secret())?;
//! assert_eq!(principal.role, Role::User);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod audit;
pub mod config;
pub mod deadline;
pub mod error;
pub mod gate;
pub mod password;
pub mod providers;
pub mod secret;
pub mod service;
pub mod state;
pub mod stores;
pub mod token;
pub mod utils;

// Mocks for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use audit::{ActionType, Activity, ActivityFilter, ActivityLogContext, ActivityTrail, NewActivity, ResourceType};
pub use config::{AuditPolicy, AuthConfig, PasswordConfig, TokenTtls};
pub use error::{AuthError, Result};
pub use gate::{AccessGate, Principal};
pub use providers::{ActivityRepository, EmailProvider, Profile, User, UserRepository};
pub use secret::SecretString;
pub use service::{
    AuthService, LoginRequest, LoginResponse, RegisterRequest, TokenPair, UpdateProfileRequest,
};
pub use state::{Role, UserId};
pub use token::{Claims, TokenIssuer, TokenKind};
