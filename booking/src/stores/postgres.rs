//! PostgreSQL booking store.
//!
//! Requires the auth schema (users and activities) to be applied first; the
//! booking tables reference `users` and activity rows are written through
//! the auth crate's insert so both crates share one `activities` table.
//!
//! # Example
//!
//! ```no_run
//! use ticketbook_booking::stores::postgres::{self, PostgresBookingStore};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/tickets").await?;
//! ticketbook_auth::stores::postgres::migrate(&pool).await?;
//! postgres::migrate(&pool).await?;
//! let store = PostgresBookingStore::new(pool);
//! # Ok(())
//! # }
//! ```

use crate::error::{BookingError, Result};
use crate::model::{Event, EventFilter, EventId, Ticket, TicketId};
use crate::providers::{BookingStore, BookingTransaction};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use ticketbook_auth::stores::postgres::activity::{contains_pattern, insert_activity};
use ticketbook_auth::{Activity, UserId};

const EVENT_COLUMNS: &str = "id, name, description, category, venue, start_date, end_date, \
     capacity, price_cents, status, is_active, created_by, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, event_id, user_id, ticket_code, quantity, unit_price_cents, \
     total_price_cents, status, purchase_date, cancelled_at, cancel_reason, created_at, updated_at";

/// Apply the booking schema.
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
        .map_err(|e| BookingError::Database(format!("Migration failed: {e}")))?;
    Ok(())
}

/// PostgreSQL booking store.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Create a new PostgreSQL booking store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database(action: &str) -> impl Fn(sqlx::Error) -> BookingError + '_ {
    move |e| BookingError::Database(format!("Failed to {action}: {e}"))
}

fn to_db_count(value: u32) -> i64 {
    i64::from(value)
}

fn from_db_count(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| BookingError::Database(format!("{column} out of range: {value}")))
}

fn event_from_row(row: &PgRow) -> Result<Event> {
    let decode = database("decode event");
    let status: String = row.try_get("status").map_err(&decode)?;

    Ok(Event {
        id: EventId(row.try_get("id").map_err(&decode)?),
        name: row.try_get("name").map_err(&decode)?,
        description: row.try_get("description").map_err(&decode)?,
        category: row.try_get("category").map_err(&decode)?,
        venue: row.try_get("venue").map_err(&decode)?,
        start_date: row.try_get("start_date").map_err(&decode)?,
        end_date: row.try_get("end_date").map_err(&decode)?,
        capacity: from_db_count(row.try_get("capacity").map_err(&decode)?, "capacity")?,
        price_cents: row.try_get("price_cents").map_err(&decode)?,
        status: status
            .parse()
            .map_err(|_| BookingError::Database(format!("Unknown event status: {status}")))?,
        is_active: row.try_get("is_active").map_err(&decode)?,
        created_by: UserId(row.try_get("created_by").map_err(&decode)?),
        created_at: row.try_get("created_at").map_err(&decode)?,
        updated_at: row.try_get("updated_at").map_err(&decode)?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket> {
    let decode = database("decode ticket");
    let status: String = row.try_get("status").map_err(&decode)?;

    Ok(Ticket {
        id: TicketId(row.try_get("id").map_err(&decode)?),
        event_id: EventId(row.try_get("event_id").map_err(&decode)?),
        user_id: UserId(row.try_get("user_id").map_err(&decode)?),
        ticket_code: row.try_get("ticket_code").map_err(&decode)?,
        quantity: from_db_count(row.try_get("quantity").map_err(&decode)?, "quantity")?,
        unit_price_cents: row.try_get("unit_price_cents").map_err(&decode)?,
        total_price_cents: row.try_get("total_price_cents").map_err(&decode)?,
        status: status
            .parse()
            .map_err(|_| BookingError::Database(format!("Unknown ticket status: {status}")))?,
        purchase_date: row.try_get("purchase_date").map_err(&decode)?,
        cancelled_at: row.try_get("cancelled_at").map_err(&decode)?,
        cancel_reason: row.try_get("cancel_reason").map_err(&decode)?,
        created_at: row.try_get("created_at").map_err(&decode)?,
        updated_at: row.try_get("updated_at").map_err(&decode)?,
    })
}

fn push_event_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    qb.push(" WHERE TRUE");

    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(after) = filter.starts_after {
        qb.push(" AND start_date >= ").push_bind(after);
    }
    if let Some(before) = filter.starts_before {
        qb.push(" AND start_date <= ").push_bind(before);
    }
    if let Some(text) = &filter.search {
        let pattern = contains_pattern(text);
        qb.push(" AND (LOWER(name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(description) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(venue) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn i64_offset(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

impl BookingStore for PostgresBookingStore {
    type Tx = PostgresBookingTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(database("begin transaction"))?;
        Ok(PostgresBookingTransaction { tx })
    }

    async fn get_event(&self, id: EventId) -> Result<Event> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(database("get event"))?
            .ok_or_else(|| BookingError::NotFound(format!("event {id} not found")))?;
        event_from_row(&row)
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<(Vec<Event>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events");
        push_event_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(database("count events"))?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM events"));
        push_event_filters(&mut select, filter);
        select
            .push(" ORDER BY start_date ASC, id LIMIT ")
            .push_bind(i64::from(filter.page_size))
            .push(" OFFSET ")
            .push_bind(i64_offset(filter.offset()));

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(database("list events"))?;
        let events = rows.iter().map(event_from_row).collect::<Result<Vec<_>>>()?;

        Ok((events, u64::try_from(total).unwrap_or(0)))
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Ticket> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(database("get ticket"))?
            .ok_or_else(|| BookingError::NotFound(format!("ticket {id} not found")))?;
        ticket_from_row(&row)
    }

    async fn list_user_tickets(
        &self,
        user: UserId,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Ticket>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE user_id = $1")
            .bind(user.0)
            .fetch_one(&self.pool)
            .await
            .map_err(database("count tickets"))?;

        let offset = u64::from(page.saturating_sub(1)) * u64::from(page_size);
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE user_id = $1 \
             ORDER BY purchase_date DESC, id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(user.0)
            .bind(i64::from(page_size))
            .bind(i64_offset(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(database("list tickets"))?;
        let tickets = rows.iter().map(ticket_from_row).collect::<Result<Vec<_>>>()?;

        Ok((tickets, u64::try_from(total).unwrap_or(0)))
    }
}

/// Open PostgreSQL transaction. Dropped without commit, it rolls back.
pub struct PostgresBookingTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresBookingTransaction {
    /// Run a keyed write, mapping "no row touched" to `NotFound`.
    async fn execute_for(
        &mut self,
        query: sqlx::query::Query<'_, Postgres, PgArguments>,
        what: String,
        action: &str,
    ) -> Result<()> {
        let result = query
            .execute(&mut *self.tx)
            .await
            .map_err(database(action))?;
        if result.rows_affected() == 0 {
            return Err(BookingError::NotFound(format!("{what} not found")));
        }
        Ok(())
    }
}

impl BookingTransaction for PostgresBookingTransaction {
    async fn insert_event(&mut self, event: &Event) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO events
                (id, name, description, category, venue, start_date, end_date,
                 capacity, price_cents, status, is_active, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(event.id.0)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.category)
        .bind(&event.venue)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(to_db_count(event.capacity))
        .bind(event.price_cents)
        .bind(event.status.as_str())
        .bind(event.is_active)
        .bind(event.created_by.0)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(database("insert event"))?;
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> Result<()> {
        let query = sqlx::query(
            r"
            UPDATE events SET
                name = $2, description = $3, category = $4, venue = $5,
                start_date = $6, end_date = $7, capacity = $8, price_cents = $9,
                status = $10, is_active = $11, updated_at = $12
            WHERE id = $1
            ",
        )
        .bind(event.id.0)
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.category)
        .bind(&event.venue)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(to_db_count(event.capacity))
        .bind(event.price_cents)
        .bind(event.status.as_str())
        .bind(event.is_active)
        .bind(event.updated_at);
        self.execute_for(query, format!("event {}", event.id), "update event")
            .await
    }

    async fn delete_event(&mut self, id: EventId) -> Result<()> {
        let query = sqlx::query("DELETE FROM events WHERE id = $1").bind(id.0);
        self.execute_for(query, format!("event {id}"), "delete event")
            .await
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO tickets
                (id, event_id, user_id, ticket_code, quantity, unit_price_cents,
                 total_price_cents, status, purchase_date, cancelled_at, cancel_reason,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(ticket.id.0)
        .bind(ticket.event_id.0)
        .bind(ticket.user_id.0)
        .bind(&ticket.ticket_code)
        .bind(to_db_count(ticket.quantity))
        .bind(ticket.unit_price_cents)
        .bind(ticket.total_price_cents)
        .bind(ticket.status.as_str())
        .bind(ticket.purchase_date)
        .bind(ticket.cancelled_at)
        .bind(&ticket.cancel_reason)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(database("insert ticket"))?;
        Ok(())
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        let query = sqlx::query(
            r"
            UPDATE tickets SET
                status = $2, cancelled_at = $3, cancel_reason = $4, updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(ticket.id.0)
        .bind(ticket.status.as_str())
        .bind(ticket.cancelled_at)
        .bind(&ticket.cancel_reason)
        .bind(ticket.updated_at);
        self.execute_for(query, format!("ticket {}", ticket.id), "update ticket")
            .await
    }

    async fn delete_ticket(&mut self, id: TicketId) -> Result<()> {
        let query = sqlx::query("DELETE FROM tickets WHERE id = $1").bind(id.0);
        self.execute_for(query, format!("ticket {id}"), "delete ticket")
            .await
    }

    async fn append_activity(&mut self, activity: &Activity) -> Result<()> {
        insert_activity(&mut *self.tx, activity).await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(database("commit transaction"))
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(database("roll back transaction"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outside_u32_are_rejected() {
        assert_eq!(from_db_count(12, "capacity").ok(), Some(12));
        assert!(from_db_count(-1, "capacity").is_err());
        assert!(from_db_count(i64::from(u32::MAX) + 1, "quantity").is_err());
    }
}
