//! In-memory booking store for testing.
//!
//! Transactions stage their writes and apply them all at commit, so a
//! rolled-back or dropped transaction leaves no trace. Activity entries land
//! in a shared [`MockActivityRepository`], which also lets a test make the
//! audit write fail.

use crate::error::{BookingError, Result};
use crate::model::{Event, EventFilter, EventId, Ticket, TicketId};
use crate::providers::{BookingStore, BookingTransaction};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use ticketbook_auth::mocks::MockActivityRepository;
use ticketbook_auth::{Activity, ActivityRepository, UserId};
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone)]
struct Tables {
    events: HashMap<EventId, Event>,
    tickets: HashMap<TicketId, Ticket>,
}

impl Tables {
    fn apply(&mut self, write: &Write) -> Result<()> {
        match write {
            Write::PutEvent(event) => {
                self.events.insert(event.id, event.clone());
            }
            Write::RemoveEvent(id) => {
                self.events
                    .remove(id)
                    .ok_or_else(|| BookingError::NotFound(format!("event {id} not found")))?;
                self.tickets.retain(|_, ticket| ticket.event_id != *id);
            }
            Write::PutTicket(ticket) => {
                if !self.events.contains_key(&ticket.event_id) {
                    return Err(BookingError::NotFound(format!(
                        "event {} not found",
                        ticket.event_id
                    )));
                }
                let duplicate = self
                    .tickets
                    .values()
                    .any(|t| t.id != ticket.id && t.ticket_code == ticket.ticket_code);
                if duplicate {
                    return Err(BookingError::Database(format!(
                        "duplicate ticket code {}",
                        ticket.ticket_code
                    )));
                }
                self.tickets.insert(ticket.id, ticket.clone());
            }
            Write::RemoveTicket(id) => {
                self.tickets
                    .remove(id)
                    .ok_or_else(|| BookingError::NotFound(format!("ticket {id} not found")))?;
            }
            Write::Activity(_) => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Write {
    PutEvent(Event),
    RemoveEvent(EventId),
    PutTicket(Ticket),
    RemoveTicket(TicketId),
    Activity(Activity),
}

/// In-memory event and ticket store.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockBookingStore {
    tables: Arc<RwLock<Tables>>,
    activities: MockActivityRepository,
}

impl MockBookingStore {
    /// Create an empty store with its own activity log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store writing activity entries into `activities`.
    #[must_use]
    pub fn with_activities(activities: MockActivityRepository) -> Self {
        Self {
            tables: Arc::default(),
            activities,
        }
    }

    /// The activity log this store commits entries into.
    #[must_use]
    pub const fn activities(&self) -> &MockActivityRepository {
        &self.activities
    }

    /// Committed events (for testing)
    pub async fn event_count(&self) -> usize {
        self.tables.read().await.events.len()
    }

    /// Committed tickets (for testing)
    pub async fn ticket_count(&self) -> usize {
        self.tables.read().await.tickets.len()
    }
}

impl BookingStore for MockBookingStore {
    type Tx = MockBookingTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send {
        let tables = Arc::clone(&self.tables);
        let activities = self.activities.clone();

        async move {
            let view = tables.read().await.clone();
            Ok(MockBookingTransaction {
                tables,
                activities,
                view,
                writes: Vec::new(),
            })
        }
    }

    fn get_event(&self, id: EventId) -> impl Future<Output = Result<Event>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            tables
                .read()
                .await
                .events
                .get(&id)
                .cloned()
                .ok_or_else(|| BookingError::NotFound(format!("event {id} not found")))
        }
    }

    fn list_events(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<(Vec<Event>, u64)>> + Send {
        let tables = Arc::clone(&self.tables);
        let filter = filter.clone();

        async move {
            let mut matching: Vec<Event> = tables
                .read()
                .await
                .events
                .values()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect();
            matching.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.0.cmp(&b.id.0)));

            let total = matching.len() as u64;
            let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
            let page = matching
                .into_iter()
                .skip(offset)
                .take(filter.page_size as usize)
                .collect();
            Ok((page, total))
        }
    }

    fn get_ticket(&self, id: TicketId) -> impl Future<Output = Result<Ticket>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            tables
                .read()
                .await
                .tickets
                .get(&id)
                .cloned()
                .ok_or_else(|| BookingError::NotFound(format!("ticket {id} not found")))
        }
    }

    fn list_user_tickets(
        &self,
        user: UserId,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<(Vec<Ticket>, u64)>> + Send {
        let tables = Arc::clone(&self.tables);

        async move {
            let mut owned: Vec<Ticket> = tables
                .read()
                .await
                .tickets
                .values()
                .filter(|t| t.user_id == user)
                .cloned()
                .collect();
            owned.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));

            let total = owned.len() as u64;
            let offset = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
            let items = owned.into_iter().skip(offset).take(page_size as usize).collect();
            Ok((items, total))
        }
    }
}

/// Staged unit of work over [`MockBookingStore`].
#[derive(Debug)]
pub struct MockBookingTransaction {
    tables: Arc<RwLock<Tables>>,
    activities: MockActivityRepository,
    /// Snapshot at `begin` with this transaction's writes applied.
    view: Tables,
    writes: Vec<Write>,
}

impl MockBookingTransaction {
    fn stage(&mut self, write: Write) -> Result<()> {
        self.view.apply(&write)?;
        self.writes.push(write);
        Ok(())
    }

    fn ensure_event(&self, id: EventId) -> Result<()> {
        if self.view.events.contains_key(&id) {
            Ok(())
        } else {
            Err(BookingError::NotFound(format!("event {id} not found")))
        }
    }

    fn ensure_ticket(&self, id: TicketId) -> Result<()> {
        if self.view.tickets.contains_key(&id) {
            Ok(())
        } else {
            Err(BookingError::NotFound(format!("ticket {id} not found")))
        }
    }
}

impl BookingTransaction for MockBookingTransaction {
    async fn insert_event(&mut self, event: &Event) -> Result<()> {
        if self.view.events.contains_key(&event.id) {
            return Err(BookingError::Database(format!("event {} already exists", event.id)));
        }
        self.stage(Write::PutEvent(event.clone()))
    }

    async fn update_event(&mut self, event: &Event) -> Result<()> {
        self.ensure_event(event.id)?;
        self.stage(Write::PutEvent(event.clone()))
    }

    async fn delete_event(&mut self, id: EventId) -> Result<()> {
        self.stage(Write::RemoveEvent(id))
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        if self.view.tickets.contains_key(&ticket.id) {
            return Err(BookingError::Database(format!("ticket {} already exists", ticket.id)));
        }
        self.stage(Write::PutTicket(ticket.clone()))
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> Result<()> {
        self.ensure_ticket(ticket.id)?;
        self.stage(Write::PutTicket(ticket.clone()))
    }

    async fn delete_ticket(&mut self, id: TicketId) -> Result<()> {
        self.stage(Write::RemoveTicket(id))
    }

    async fn append_activity(&mut self, activity: &Activity) -> Result<()> {
        if self.activities.writes_failing() {
            return Err(BookingError::Database("activity store unavailable".to_string()));
        }
        self.writes.push(Write::Activity(activity.clone()));
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        for write in &self.writes {
            next.apply(write)?;
        }

        for write in &self.writes {
            if let Write::Activity(activity) = write {
                self.activities.create(activity).await.map_err(BookingError::from)?;
            }
        }
        *tables = next;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NewEvent;
    use chrono::{Duration, Utc};

    fn event() -> Event {
        let start = Utc::now() + Duration::days(3);
        NewEvent {
            name: "Jazz Night".to_string(),
            description: String::new(),
            category: "concert".to_string(),
            venue: "Blue Room".to_string(),
            start_date: start,
            end_date: start + Duration::hours(2),
            capacity: 80,
            price_cents: 2_000,
        }
        .into_event(UserId::new())
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_nothing() {
        let store = MockBookingStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_event(&event()).await.unwrap();
        }
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn update_of_missing_event_is_not_found() {
        let store = MockBookingStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.update_event(&event()).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }
}
