//! PostgreSQL activity repository implementation.

use crate::audit::{Activity, ActivityFilter, ActivityId};
use crate::error::{AuthError, Result};
use crate::providers::ActivityRepository;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

/// PostgreSQL activity repository.
#[derive(Clone)]
pub struct PostgresActivityRepository {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresActivityRepository {
    /// Create a new PostgreSQL activity repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert one activity row. Shared with transactional writers.
///
/// # Errors
///
/// Returns [`AuthError::DatabaseError`] if the insert fails.
pub async fn insert_activity<'e, X>(executor: X, activity: &Activity) -> Result<()>
where
    X: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r"
        INSERT INTO activities
            (id, user_id, username, action_type, resource_type, resource_id,
             timestamp, ip_address, details, old_value, new_value)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ",
    )
    .bind(activity.id.0)
    .bind(activity.user_id.map(|id| id.0))
    .bind(&activity.username)
    .bind(activity.action.as_str())
    .bind(activity.resource_type.as_str())
    .bind(&activity.resource_id)
    .bind(activity.timestamp)
    .bind(&activity.ip_address)
    .bind(&activity.details)
    .bind(&activity.old_value)
    .bind(&activity.new_value)
    .execute(executor)
    .await
    .map_err(|e| AuthError::DatabaseError(format!("Failed to insert activity: {e}")))?;
    Ok(())
}

/// `%text%` with LIKE wildcards in `text` escaped, lowercased for
/// comparison against `LOWER(column)`.
pub fn contains_pattern(text: &str) -> String {
    let escaped = text
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ActivityFilter) {
    qb.push(" WHERE TRUE");

    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id.0);
    }
    if let Some(action) = filter.action {
        qb.push(" AND action_type = ").push_bind(action.as_str());
    }
    if let Some(resource_type) = filter.resource_type {
        qb.push(" AND resource_type = ").push_bind(resource_type.as_str());
    }
    if let Some(resource_id) = &filter.resource_id {
        qb.push(" AND resource_id = ").push_bind(resource_id.clone());
    }
    if let Some(ip) = &filter.ip_address {
        qb.push(" AND LOWER(ip_address) LIKE ")
            .push_bind(contains_pattern(ip));
    }
    if let Some(start) = filter.start {
        qb.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        qb.push(" AND timestamp <= ").push_bind(end);
    }
    if let Some(text) = &filter.search {
        let pattern = contains_pattern(text);
        qb.push(" AND (LOWER(details) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(username) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn activity_from_row(row: &PgRow) -> Result<Activity> {
    let decode =
        |e: sqlx::Error| AuthError::DatabaseError(format!("Failed to decode activity: {e}"));
    let action: String = row.try_get("action_type").map_err(decode)?;
    let resource_type: String = row.try_get("resource_type").map_err(decode)?;
    let user_id: Option<uuid::Uuid> = row.try_get("user_id").map_err(decode)?;

    Ok(Activity {
        id: ActivityId(row.try_get("id").map_err(decode)?),
        user_id: user_id.map(UserId),
        username: row.try_get("username").map_err(decode)?,
        action: action
            .parse()
            .map_err(|_| AuthError::DatabaseError(format!("Unknown action type: {action}")))?,
        resource_type: resource_type.parse().map_err(|_| {
            AuthError::DatabaseError(format!("Unknown resource type: {resource_type}"))
        })?,
        resource_id: row.try_get("resource_id").map_err(decode)?,
        timestamp: row.try_get("timestamp").map_err(decode)?,
        ip_address: row.try_get("ip_address").map_err(decode)?,
        details: row.try_get("details").map_err(decode)?,
        old_value: row.try_get("old_value").map_err(decode)?,
        new_value: row.try_get("new_value").map_err(decode)?,
    })
}

impl ActivityRepository for PostgresActivityRepository {
    async fn create(&self, activity: &Activity) -> Result<()> {
        insert_activity(&self.pool, activity).await
    }

    async fn list(&self, filter: &ActivityFilter) -> Result<(Vec<Activity>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM activities");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to count activities: {e}")))?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT id, user_id, username, action_type, resource_type, resource_id, \
             timestamp, ip_address, details, old_value, new_value FROM activities",
        );
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY timestamp DESC, id LIMIT ")
            .push_bind(i64::from(filter.page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX));

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to list activities: {e}")))?;

        let activities = rows
            .iter()
            .map(activity_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((activities, u64::try_from(total).unwrap_or(0)))
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM activities WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to purge activities: {e}")))?;
        Ok(result.rows_affected())
    }
}
