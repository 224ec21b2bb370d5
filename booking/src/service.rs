//! Event and ticket orchestrator.
//!
//! Every mutation runs inside one [`BookingTransaction`]: the business write
//! and its activity entry are committed together. If the entry cannot be
//! written (invalid attribution, store failure, deadline) the transaction is
//! rolled back and [`BookingError::audit_failed`] is returned, so a change
//! is never visible without its audit row.
//!
//! Listing reads write their `view_*` entry best-effort in a short
//! transaction of their own; a failure there is logged and counted but does
//! not fail the read.

use crate::config::BookingConfig;
use crate::error::{BookingError, Result};
use crate::model::{
    Event, EventChanges, EventFilter, EventId, NewEvent, Page, Ticket, TicketId, TicketStatus,
    generate_ticket_code, normalize_page,
};
use crate::providers::{BookingStore, BookingTransaction};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use ticketbook_auth::audit::{self, ActionType, ActivityLogContext, NewActivity, ResourceType};
use ticketbook_auth::UserId;
use ticketbook_auth::deadline::with_deadline;
use tracing::{error, info, instrument, warn};

/// Booking orchestrator.
#[derive(Debug, Clone)]
pub struct BookingService<S> {
    store: S,
    config: BookingConfig,
}

impl<S: BookingStore> BookingService<S> {
    /// Wire the orchestrator.
    #[must_use]
    pub const fn new(store: S, config: BookingConfig) -> Self {
        Self { store, config }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Create an event owned by the acting user.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for invalid input or an anonymous
    /// context, [`BookingError::Internal`] if the audit entry cannot be
    /// written, or the store's error.
    #[instrument(skip(self, new_event, ctx), fields(name = %new_event.name))]
    pub async fn create_event(&self, new_event: NewEvent, ctx: &ActivityLogContext) -> Result<Event> {
        new_event.validate()?;
        let creator = actor(ctx)?;
        let event = new_event.into_event(creator);

        let entry = NewActivity::from_context(ctx, ActionType::CreateEvent, ResourceType::Event)
            .with_resource_id(event.id)
            .with_details(format!("New Event '{}' created.", event.name))
            .with_change(None, Some(snapshot(&event)?));

        let mut tx = self.begin().await?;
        let written = self.bounded("booking.insert_event", tx.insert_event(&event)).await;
        if let Err(e) = written {
            self.abort(tx).await;
            return Err(e);
        }
        self.commit_with_audit(tx, entry).await?;

        info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    /// Load an event.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] or the store's error.
    pub async fn get_event(&self, id: EventId) -> Result<Event> {
        self.bounded("booking.get_event", self.store.get_event(id)).await
    }

    /// Apply the present fields of `changes`.
    ///
    /// When nothing differs the stored event is returned without a write or
    /// an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown event,
    /// [`BookingError::Validation`] if the result would be invalid,
    /// [`BookingError::Internal`] if the audit entry cannot be written, or
    /// the store's error.
    #[instrument(skip(self, changes, ctx))]
    pub async fn update_event(
        &self,
        id: EventId,
        changes: EventChanges,
        ctx: &ActivityLogContext,
    ) -> Result<Event> {
        actor(ctx)?;
        let mut event = self.get_event(id).await?;
        let old = snapshot(&event)?;

        if !changes.apply(&mut event)? {
            return Ok(event);
        }
        event.updated_at = Utc::now();

        let entry = NewActivity::from_context(ctx, ActionType::UpdateEvent, ResourceType::Event)
            .with_resource_id(event.id)
            .with_details(format!("Event '{}' updated.", event.name))
            .with_change(Some(old), Some(snapshot(&event)?));

        let mut tx = self.begin().await?;
        let written = self.bounded("booking.update_event", tx.update_event(&event)).await;
        if let Err(e) = written {
            self.abort(tx).await;
            return Err(e);
        }
        self.commit_with_audit(tx, entry).await?;

        info!(event_id = %event.id, "Event updated");
        Ok(event)
    }

    /// Delete an event together with its tickets.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown event,
    /// [`BookingError::Internal`] if the audit entry cannot be written, or
    /// the store's error.
    #[instrument(skip(self, ctx))]
    pub async fn delete_event(&self, id: EventId, ctx: &ActivityLogContext) -> Result<()> {
        actor(ctx)?;
        let event = self.get_event(id).await?;

        let entry = NewActivity::from_context(ctx, ActionType::DeleteEvent, ResourceType::Event)
            .with_resource_id(event.id)
            .with_details(format!("Event '{}' deleted.", event.name))
            .with_change(Some(snapshot(&event)?), None);

        let mut tx = self.begin().await?;
        let written = self.bounded("booking.delete_event", tx.delete_event(id)).await;
        if let Err(e) = written {
            self.abort(tx).await;
            return Err(e);
        }
        self.commit_with_audit(tx, entry).await?;

        info!(event_id = %id, "Event deleted");
        Ok(())
    }

    /// One page of events matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns the store's error. A failed `view_events` entry is not an
    /// error.
    #[instrument(skip(self, filter, ctx))]
    pub async fn list_events(&self, filter: EventFilter, ctx: &ActivityLogContext) -> Result<Page<Event>> {
        let filter = filter.normalized();
        let (events, total) = self
            .bounded("booking.list_events", self.store.list_events(&filter))
            .await?;

        self.record_view(
            NewActivity::from_context(ctx, ActionType::ViewEvents, ResourceType::Event)
                .with_details("Viewed all events."),
        )
        .await;

        Ok(Page::new(events, total, filter.page, filter.page_size))
    }

    // ------------------------------------------------------------------
    // Tickets
    // ------------------------------------------------------------------

    /// Buy `quantity` seats for an event on behalf of the acting user.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for a zero quantity, an anonymous
    /// context or an event not open for booking, [`BookingError::NotFound`]
    /// for an unknown event, [`BookingError::Internal`] if the audit entry
    /// cannot be written, or the store's error.
    #[instrument(skip(self, ctx))]
    pub async fn purchase_ticket(
        &self,
        event_id: EventId,
        quantity: u32,
        ctx: &ActivityLogContext,
    ) -> Result<Ticket> {
        if quantity == 0 {
            return Err(BookingError::validation("quantity must be greater than zero"));
        }
        let owner = actor(ctx)?;
        let event = self.get_event(event_id).await?;
        if !event.is_bookable() {
            return Err(BookingError::validation(format!(
                "event '{}' is not open for booking",
                event.name
            )));
        }

        let total_price_cents = event
            .price_cents
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| BookingError::validation("order total is out of range"))?;
        let now = Utc::now();
        let ticket = Ticket {
            id: TicketId::new(),
            event_id,
            user_id: owner,
            ticket_code: generate_ticket_code(now),
            quantity,
            unit_price_cents: event.price_cents,
            total_price_cents,
            status: TicketStatus::Active,
            purchase_date: now,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };

        let entry = NewActivity::from_context(ctx, ActionType::PurchaseTicket, ResourceType::Ticket)
            .with_resource_id(ticket.id)
            .with_details(format!(
                "New Ticket '{}' purchase issued. Ticket Code: {}",
                ticket.id, ticket.ticket_code
            ))
            .with_change(None, Some(snapshot(&ticket)?));

        let mut tx = self.begin().await?;
        let written = self.bounded("booking.insert_ticket", tx.insert_ticket(&ticket)).await;
        if let Err(e) = written {
            self.abort(tx).await;
            return Err(e);
        }
        self.commit_with_audit(tx, entry).await?;

        info!(ticket_id = %ticket.id, event_id = %event_id, quantity, "Ticket purchased");
        Ok(ticket)
    }

    /// Load a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] or the store's error.
    pub async fn get_ticket(&self, id: TicketId) -> Result<Ticket> {
        self.bounded("booking.get_ticket", self.store.get_ticket(id)).await
    }

    /// Move a ticket to `status`. A non-empty `reason` records a
    /// cancellation timestamp alongside it.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown ticket,
    /// [`BookingError::Validation`] for an anonymous context,
    /// [`BookingError::Internal`] if the audit entry cannot be written, or
    /// the store's error.
    #[instrument(skip(self, reason, ctx))]
    pub async fn update_ticket_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        reason: Option<String>,
        ctx: &ActivityLogContext,
    ) -> Result<Ticket> {
        actor(ctx)?;
        let mut ticket = self.get_ticket(id).await?;
        let old = snapshot(&ticket)?;

        let now = Utc::now();
        ticket.status = status;
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            ticket.cancel_reason = Some(reason);
            ticket.cancelled_at = Some(now);
        }
        ticket.updated_at = now;

        let entry = NewActivity::from_context(ctx, ActionType::UpdateTicketStatus, ResourceType::Ticket)
            .with_resource_id(ticket.id)
            .with_details(format!(
                "Ticket Status updated to '{}'. Ticket Code: {}",
                ticket.status, ticket.ticket_code
            ))
            .with_change(Some(old), Some(snapshot(&ticket)?));

        let mut tx = self.begin().await?;
        let written = self.bounded("booking.update_ticket", tx.update_ticket(&ticket)).await;
        if let Err(e) = written {
            self.abort(tx).await;
            return Err(e);
        }
        self.commit_with_audit(tx, entry).await?;

        info!(ticket_id = %id, status = %status, "Ticket status updated");
        Ok(ticket)
    }

    /// Delete a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] for an unknown ticket,
    /// [`BookingError::Internal`] if the audit entry cannot be written, or
    /// the store's error.
    #[instrument(skip(self, ctx))]
    pub async fn delete_ticket(&self, id: TicketId, ctx: &ActivityLogContext) -> Result<()> {
        actor(ctx)?;
        let ticket = self.get_ticket(id).await?;

        let entry = NewActivity::from_context(ctx, ActionType::DeleteTicket, ResourceType::Ticket)
            .with_resource_id(ticket.id)
            .with_details(format!(
                "Ticket '{}' deleted. Ticket Code: {}",
                ticket.id, ticket.ticket_code
            ))
            .with_change(Some(snapshot(&ticket)?), None);

        let mut tx = self.begin().await?;
        let written = self.bounded("booking.delete_ticket", tx.delete_ticket(id)).await;
        if let Err(e) = written {
            self.abort(tx).await;
            return Err(e);
        }
        self.commit_with_audit(tx, entry).await?;

        info!(ticket_id = %id, "Ticket deleted");
        Ok(())
    }

    /// One page of `user`'s tickets, newest purchase first.
    ///
    /// # Errors
    ///
    /// Returns the store's error. A failed `view_tickets` entry is not an
    /// error.
    #[instrument(skip(self, ctx))]
    pub async fn list_user_tickets(
        &self,
        user: UserId,
        page: u32,
        page_size: u32,
        ctx: &ActivityLogContext,
    ) -> Result<Page<Ticket>> {
        let (page, page_size) = normalize_page(page, page_size);
        let (tickets, total) = self
            .bounded(
                "booking.list_user_tickets",
                self.store.list_user_tickets(user, page, page_size),
            )
            .await?;

        self.record_view(
            NewActivity::from_context(ctx, ActionType::ViewTickets, ResourceType::Ticket)
                .with_resource_id(user)
                .with_details(format!("Viewed tickets of user {user}.")),
        )
        .await;

        Ok(Page::new(tickets, total, page, page_size))
    }

    // ------------------------------------------------------------------
    // Transaction plumbing
    // ------------------------------------------------------------------

    /// Bound a store call by the configured deadline.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(self.config.store_timeout, operation, fut).await
    }

    async fn begin(&self) -> Result<S::Tx> {
        self.bounded("booking.begin", self.store.begin()).await
    }

    async fn abort(&self, tx: S::Tx) {
        if let Err(e) = self.bounded("booking.rollback", tx.rollback()).await {
            warn!(error = %e, "Rollback failed");
        }
    }

    /// Append `entry` inside `tx` and commit, or roll everything back.
    async fn commit_with_audit(&self, mut tx: S::Tx, entry: NewActivity) -> Result<()> {
        let action = entry.action;
        let appended = match audit::prepare(entry) {
            Ok(activity) => {
                self.bounded("booking.append_activity", tx.append_activity(&activity))
                    .await
            }
            Err(e) => Err(BookingError::from(e)),
        };

        if let Err(e) = appended {
            error!(action = %action, error = %e, "Activity write failed, rolling back");
            metrics::counter!("ticketbook_booking_audit_failures_total", "action" => action.as_str())
                .increment(1);
            self.abort(tx).await;
            return Err(BookingError::audit_failed());
        }

        self.bounded("booking.commit", tx.commit()).await
    }

    /// Write a read-side entry in its own transaction. Never fails.
    async fn record_view(&self, entry: NewActivity) {
        let action = entry.action;
        if let Err(e) = self.try_record_view(entry).await {
            warn!(action = %action, error = %e, "Failed to record activity");
            metrics::counter!("ticketbook_audit_write_failures_total", "action" => action.as_str())
                .increment(1);
        }
    }

    async fn try_record_view(&self, entry: NewActivity) -> Result<()> {
        let activity = audit::prepare(entry)?;
        let mut tx = self.begin().await?;
        let appended = self
            .bounded("booking.append_activity", tx.append_activity(&activity))
            .await;
        if let Err(e) = appended {
            self.abort(tx).await;
            return Err(e);
        }
        self.bounded("booking.commit", tx.commit()).await
    }
}

/// The acting user, required for every mutation.
fn actor(ctx: &ActivityLogContext) -> Result<UserId> {
    ctx.user_id
        .ok_or_else(|| BookingError::validation("an authenticated user is required"))
}

fn snapshot<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| BookingError::Internal(format!("Failed to serialize snapshot: {e}")))
}
