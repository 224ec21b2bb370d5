//! PostgreSQL user repository implementation.
//!
//! # Example
//!
//! ```no_run
//! use ticketbook_auth::stores::postgres::PostgresUserRepository;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/tickets").await?;
//! let repo = PostgresUserRepository::new(pool);
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::{User, UserRepository};
use crate::state::{Role, UserId};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, role, is_active, \
     email_verified, last_login_at, refresh_token_hash, refresh_token_expires_at, \
     password_reset_token_hash, password_reset_expires_at, created_at, updated_at";

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PostgresUserRepository {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new PostgreSQL user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str, what: &str) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to get user: {e}")))?
            .ok_or_else(|| AuthError::NotFound(format!("user {what} not found")))?;
        user_from_row(&row)
    }

    async fn execute_for(&self, id: UserId, sql: &str, action: &str) -> Result<()> {
        let result = sqlx::query(sql)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to {action}: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("user {id} not found")));
        }
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let decode = |e: sqlx::Error| AuthError::DatabaseError(format!("Failed to decode user: {e}"));
    let role: String = row.try_get("role").map_err(decode)?;

    Ok(User {
        id: UserId(row.try_get("id").map_err(decode)?),
        username: row.try_get("username").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        full_name: row.try_get("full_name").map_err(decode)?,
        role: role
            .parse::<Role>()
            .map_err(|_| AuthError::DatabaseError(format!("Unknown role in users table: {role}")))?,
        is_active: row.try_get("is_active").map_err(decode)?,
        email_verified: row.try_get("email_verified").map_err(decode)?,
        last_login_at: row.try_get("last_login_at").map_err(decode)?,
        refresh_token_hash: row.try_get("refresh_token_hash").map_err(decode)?,
        refresh_token_expires_at: row.try_get("refresh_token_expires_at").map_err(decode)?,
        password_reset_token_hash: row.try_get("password_reset_token_hash").map_err(decode)?,
        password_reset_expires_at: row.try_get("password_reset_expires_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> Result<User> {
        sqlx::query(
            r"
            INSERT INTO users
                (id, username, email, password_hash, full_name, role, is_active,
                 email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AuthError::validation("username or email already exists");
                }
            }
            AuthError::DatabaseError(format!("Failed to create user: {e}"))
        })?;

        Ok(user.clone())
    }

    async fn get_by_username(&self, username: &str) -> Result<User> {
        self.fetch_one_by("username", username, &format!("'{username}'"))
            .await
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        self.fetch_one_by("email", email, &format!("with email '{email}'"))
            .await
    }

    async fn get_by_id(&self, id: UserId) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to get user: {e}")))?
            .ok_or_else(|| AuthError::NotFound(format!("user {id} not found")))?;
        user_from_row(&row)
    }

    async fn update(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET email = $2,
                full_name = $3,
                password_hash = $4,
                role = $5,
                is_active = $6,
                email_verified = $7,
                updated_at = $8
            WHERE id = $1
            ",
        )
        .bind(user.id.0)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AuthError::validation("email already exists");
                }
            }
            AuthError::DatabaseError(format!("Failed to update user: {e}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("user {} not found", user.id)));
        }
        Ok(())
    }

    async fn save_refresh_token(
        &self,
        id: UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $2, refresh_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id.0)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to save refresh token: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("user {id} not found")));
        }
        Ok(())
    }

    async fn clear_refresh_token(&self, id: UserId) -> Result<()> {
        self.execute_for(
            id,
            "UPDATE users SET refresh_token_hash = NULL, refresh_token_expires_at = NULL WHERE id = $1",
            "clear refresh token",
        )
        .await
    }

    async fn save_password_reset_token(
        &self,
        id: UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET password_reset_token_hash = $2, password_reset_expires_at = $3 WHERE id = $1",
        )
        .bind(id.0)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to save reset token: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("user {id} not found")));
        }
        Ok(())
    }

    async fn clear_password_reset_token(&self, id: UserId) -> Result<()> {
        self.execute_for(
            id,
            "UPDATE users SET password_reset_token_hash = NULL, password_reset_expires_at = NULL WHERE id = $1",
            "clear reset token",
        )
        .await
    }

    async fn update_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id.0)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to update last login: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!("user {id} not found")));
        }
        Ok(())
    }
}
