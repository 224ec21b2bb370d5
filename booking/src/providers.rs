//! Storage seams for the booking flows.
//!
//! Reads go through [`BookingStore`] directly. Every mutation goes through a
//! [`BookingTransaction`] so the business write and its activity entry land
//! together or not at all.

use crate::error::Result;
use crate::model::{Event, EventFilter, EventId, Ticket, TicketId};
use std::future::Future;
use ticketbook_auth::{Activity, UserId};

/// Event and ticket storage.
pub trait BookingStore: Send + Sync {
    /// Transaction handle returned by [`BookingStore::begin`].
    type Tx: BookingTransaction;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot start a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;

    /// Load an event.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such event exists.
    fn get_event(&self, id: EventId) -> impl Future<Output = Result<Event>> + Send;

    /// One page of events matching `filter`, soonest first, plus the total
    /// number of matching events. The filter arrives normalized.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn list_events(
        &self,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<(Vec<Event>, u64)>> + Send;

    /// Load a ticket.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such ticket exists.
    fn get_ticket(&self, id: TicketId) -> impl Future<Output = Result<Ticket>> + Send;

    /// One page of `user`'s tickets, newest purchase first, plus the total.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn list_user_tickets(
        &self,
        user: UserId,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<(Vec<Ticket>, u64)>> + Send;
}

/// An open all-or-nothing unit of work.
///
/// Dropping a transaction without committing discards its writes.
pub trait BookingTransaction: Send {
    /// Insert a new event.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    fn insert_event(&mut self, event: &Event) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite an existing event.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event does not exist.
    fn update_event(&mut self, event: &Event) -> impl Future<Output = Result<()>> + Send;

    /// Delete an event and its tickets.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event does not exist.
    fn delete_event(&mut self, id: EventId) -> impl Future<Output = Result<()>> + Send;

    /// Insert a new ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails (unknown event, duplicate code).
    fn insert_ticket(&mut self, ticket: &Ticket) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite an existing ticket.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the ticket does not exist.
    fn update_ticket(&mut self, ticket: &Ticket) -> impl Future<Output = Result<()>> + Send;

    /// Delete a ticket.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the ticket does not exist.
    fn delete_ticket(&mut self, id: TicketId) -> impl Future<Output = Result<()>> + Send;

    /// Append an activity entry inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    fn append_activity(&mut self, activity: &Activity) -> impl Future<Output = Result<()>> + Send;

    /// Make every write visible.
    ///
    /// # Errors
    ///
    /// Returns error if the commit fails; nothing is visible in that case.
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    /// Discard every write.
    ///
    /// # Errors
    ///
    /// Returns error if the store reports a rollback failure.
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}
