//! PostgreSQL storage implementations.
//!
//! Queries are built at runtime (`sqlx::query`) so the crate compiles
//! without a live database. The schema ships in `auth/migrations`.

pub mod activity;
pub mod user;

// Re-exports
pub use activity::PostgresActivityRepository;
pub use user::PostgresUserRepository;

use crate::error::{AuthError, Result};
use sqlx::PgPool;

/// Apply the auth schema.
///
/// Versions applied by other crates' migration sets sharing the database
/// are tolerated.
///
/// # Errors
///
/// Returns error if migrations fail.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Migration failed: {e}")))?;
    Ok(())
}
