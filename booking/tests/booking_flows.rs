//! Integration tests for the booking flows against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use ticketbook_auth::{ActionType, ActivityLogContext, ResourceType, UserId};
use ticketbook_booking::mocks::MockBookingStore;
use ticketbook_booking::{
    BookingConfig, BookingError, BookingService, EventChanges, EventFilter, EventId, EventStatus,
    NewEvent, TicketStatus,
};

struct Harness {
    booking: BookingService<MockBookingStore>,
    store: MockBookingStore,
}

impl Harness {
    fn new() -> Self {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
        let store = MockBookingStore::new();
        Self {
            booking: BookingService::new(store.clone(), BookingConfig::default()),
            store,
        }
    }
}

fn admin() -> ActivityLogContext {
    ActivityLogContext::new(UserId::new(), "admin", Some("10.0.0.1".to_string()))
}

fn buyer() -> ActivityLogContext {
    ActivityLogContext::new(UserId::new(), "bob", Some("198.51.100.20".to_string()))
}

fn new_event(name: &str, days_ahead: i64) -> NewEvent {
    let start = Utc::now() + Duration::days(days_ahead);
    NewEvent {
        name: name.to_string(),
        description: "An evening of live music".to_string(),
        category: "concert".to_string(),
        venue: "Riverside Arena".to_string(),
        start_date: start,
        end_date: start + Duration::hours(3),
        capacity: 1_000,
        price_cents: 2_500,
    }
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_create_event_commits_with_audit() {
    let h = Harness::new();
    let ctx = admin();

    let event = h.booking.create_event(new_event("Summer Gala", 10), &ctx).await.unwrap();

    assert_eq!(h.store.event_count().await, 1);
    assert_eq!(event.created_by, ctx.user_id.unwrap());
    assert_eq!(event.status, EventStatus::Active);

    let entries = h.store.activities().all().await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, ActionType::CreateEvent);
    assert_eq!(entry.resource_type, ResourceType::Event);
    assert_eq!(entry.resource_id.as_deref(), Some(event.id.to_string().as_str()));
    assert_eq!(entry.details.as_deref(), Some("New Event 'Summer Gala' created."));
    assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    assert!(entry.old_value.is_none());
    assert_eq!(entry.new_value.as_ref().unwrap()["name"], "Summer Gala");
}

#[tokio::test]
async fn test_create_event_rolls_back_when_audit_fails() {
    let h = Harness::new();
    h.store.activities().fail_writes(true);

    let err = h
        .booking
        .create_event(new_event("Doomed", 5), &admin())
        .await
        .unwrap_err();

    assert_eq!(err, BookingError::audit_failed());
    assert_eq!(err.code(), "INTERNAL_ERROR");
    assert_eq!(h.store.event_count().await, 0);
    assert_eq!(h.store.activities().count().await, 0);
}

#[tokio::test]
async fn test_unattributable_audit_entry_rolls_back() {
    let h = Harness::new();
    let nameless = ActivityLogContext::new(UserId::new(), "", None);

    let err = h
        .booking
        .create_event(new_event("Nameless", 5), &nameless)
        .await
        .unwrap_err();

    assert_eq!(err, BookingError::audit_failed());
    assert_eq!(h.store.event_count().await, 0);
}

#[tokio::test]
async fn test_anonymous_context_cannot_mutate() {
    let h = Harness::new();

    let err = h
        .booking
        .create_event(new_event("Anon", 5), &ActivityLogContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Validation { .. }));
    assert_eq!(h.store.event_count().await, 0);
}

#[tokio::test]
async fn test_invalid_event_lists_every_problem() {
    let h = Harness::new();
    let mut bad = new_event("", 5);
    bad.price_cents = -1;

    let err = h.booking.create_event(bad, &admin()).await.unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(err.details().len(), 2);
}

#[tokio::test]
async fn test_update_event_snapshots_old_and_new() {
    let h = Harness::new();
    let ctx = admin();
    let event = h.booking.create_event(new_event("Autumn Recital", 20), &ctx).await.unwrap();

    let updated = h
        .booking
        .update_event(
            event.id,
            EventChanges {
                venue: Some("Old Town Hall".to_string()),
                price_cents: Some(3_000),
                ..EventChanges::default()
            },
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(updated.venue, "Old Town Hall");
    assert_eq!(updated.name, "Autumn Recital");
    assert!(updated.updated_at >= event.updated_at);
    assert_eq!(h.booking.get_event(event.id).await.unwrap(), updated);

    let entries = h.store.activities().all().await;
    let entry = entries.iter().find(|a| a.action == ActionType::UpdateEvent).unwrap();
    assert_eq!(entry.details.as_deref(), Some("Event 'Autumn Recital' updated."));
    assert_eq!(entry.old_value.as_ref().unwrap()["venue"], "Riverside Arena");
    assert_eq!(entry.new_value.as_ref().unwrap()["venue"], "Old Town Hall");
    assert_eq!(entry.new_value.as_ref().unwrap()["price_cents"], 3_000);
}

#[tokio::test]
async fn test_update_without_differences_writes_nothing() {
    let h = Harness::new();
    let ctx = admin();
    let event = h.booking.create_event(new_event("Steady", 20), &ctx).await.unwrap();

    let same = h
        .booking
        .update_event(
            event.id,
            EventChanges {
                name: Some("Steady".to_string()),
                ..EventChanges::default()
            },
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(same, event);
    assert_eq!(h.store.activities().count().await, 1);
}

#[tokio::test]
async fn test_update_rejects_end_before_start() {
    let h = Harness::new();
    let ctx = admin();
    let event = h.booking.create_event(new_event("Timeline", 20), &ctx).await.unwrap();

    let err = h
        .booking
        .update_event(
            event.id,
            EventChanges {
                end_date: Some(event.start_date - Duration::hours(1)),
                ..EventChanges::default()
            },
            &ctx,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::Validation { .. }));
    assert_eq!(h.booking.get_event(event.id).await.unwrap(), event);
}

#[tokio::test]
async fn test_update_unknown_event_is_not_found() {
    let h = Harness::new();
    let err = h
        .booking
        .update_event(EventId::new(), EventChanges::default(), &admin())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_delete_event_cascades_to_tickets() {
    let h = Harness::new();
    let ctx = admin();
    let event = h.booking.create_event(new_event("Farewell Tour", 30), &ctx).await.unwrap();
    h.booking.purchase_ticket(event.id, 1, &buyer()).await.unwrap();
    h.booking.purchase_ticket(event.id, 3, &buyer()).await.unwrap();

    h.booking.delete_event(event.id, &ctx).await.unwrap();

    assert_eq!(h.store.event_count().await, 0);
    assert_eq!(h.store.ticket_count().await, 0);
    let entries = h.store.activities().all().await;
    let entry = entries.iter().find(|a| a.action == ActionType::DeleteEvent).unwrap();
    assert_eq!(entry.old_value.as_ref().unwrap()["name"], "Farewell Tour");
    assert!(entry.new_value.is_none());
}

#[tokio::test]
async fn test_delete_event_keeps_event_when_audit_fails() {
    let h = Harness::new();
    let ctx = admin();
    let event = h.booking.create_event(new_event("Survivor", 30), &ctx).await.unwrap();

    h.store.activities().fail_writes(true);
    let err = h.booking.delete_event(event.id, &ctx).await.unwrap_err();

    assert_eq!(err, BookingError::audit_failed());
    assert_eq!(h.booking.get_event(event.id).await.unwrap(), event);
}

#[tokio::test]
async fn test_list_events_filters_and_pages() {
    let h = Harness::new();
    let ctx = admin();
    for day in 1..=12 {
        h.booking
            .create_event(new_event(&format!("Night {day}"), day), &ctx)
            .await
            .unwrap();
    }
    let mut talk = new_event("Rust Meetup", 3);
    talk.category = "conference".to_string();
    talk.venue = "Innovation Hub".to_string();
    h.booking.create_event(talk, &ctx).await.unwrap();

    let first = h.booking.list_events(EventFilter::new(), &ctx).await.unwrap();
    assert_eq!(first.total, 13);
    assert_eq!(first.page, 1);
    assert_eq!(first.page_size, 10);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.items.len(), 10);
    assert!(first.items.windows(2).all(|w| w[0].start_date <= w[1].start_date));

    let second = h
        .booking
        .list_events(EventFilter { page: 2, ..EventFilter::new() }, &ctx)
        .await
        .unwrap();
    assert_eq!(second.items.len(), 3);

    let conferences = h
        .booking
        .list_events(
            EventFilter {
                category: Some("conference".to_string()),
                ..EventFilter::new()
            },
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(conferences.total, 1);

    let searched = h
        .booking
        .list_events(
            EventFilter {
                search: Some("innovation".to_string()),
                ..EventFilter::new()
            },
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(searched.items[0].name, "Rust Meetup");
}

#[tokio::test]
async fn test_list_events_records_view_best_effort() {
    let h = Harness::new();
    let ctx = admin();
    h.booking.create_event(new_event("Visible", 4), &ctx).await.unwrap();

    h.booking.list_events(EventFilter::new(), &ctx).await.unwrap();
    let entries = h.store.activities().all().await;
    assert!(entries.iter().any(|a| a.action == ActionType::ViewEvents
        && a.details.as_deref() == Some("Viewed all events.")));

    h.store.activities().fail_writes(true);
    let page = h.booking.list_events(EventFilter::new(), &ctx).await.unwrap();
    assert_eq!(page.total, 1);
}

// ============================================================================
// Tickets
// ============================================================================

#[tokio::test]
async fn test_purchase_prices_from_event_and_audits() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Opera Night", 7), &admin()).await.unwrap();
    let ctx = buyer();

    let ticket = h.booking.purchase_ticket(event.id, 4, &ctx).await.unwrap();

    assert_eq!(ticket.user_id, ctx.user_id.unwrap());
    assert_eq!(ticket.event_id, event.id);
    assert_eq!(ticket.quantity, 4);
    assert_eq!(ticket.unit_price_cents, 2_500);
    assert_eq!(ticket.total_price_cents, 10_000);
    assert_eq!(ticket.status, TicketStatus::Active);
    assert!(ticket.ticket_code.starts_with("TKT-"));
    assert_eq!(h.booking.get_ticket(ticket.id).await.unwrap(), ticket);

    let entries = h.store.activities().all().await;
    let entry = entries.iter().find(|a| a.action == ActionType::PurchaseTicket).unwrap();
    assert_eq!(entry.action.as_str(), "purchase-ticket");
    assert_eq!(entry.username, "bob");
    assert_eq!(entry.resource_type, ResourceType::Ticket);
    assert!(entry.details.as_deref().unwrap().contains(&ticket.ticket_code));
}

#[tokio::test]
async fn test_purchase_rejects_zero_quantity() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Zero", 7), &admin()).await.unwrap();

    let err = h.booking.purchase_ticket(event.id, 0, &buyer()).await.unwrap_err();

    assert!(matches!(err, BookingError::Validation { .. }));
    assert_eq!(h.store.ticket_count().await, 0);
}

#[tokio::test]
async fn test_purchase_requires_bookable_event() {
    let h = Harness::new();
    let ctx = admin();
    let event = h.booking.create_event(new_event("Called Off", 7), &ctx).await.unwrap();
    h.booking
        .update_event(
            event.id,
            EventChanges {
                status: Some(EventStatus::Cancelled),
                ..EventChanges::default()
            },
            &ctx,
        )
        .await
        .unwrap();

    let err = h.booking.purchase_ticket(event.id, 1, &buyer()).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation { .. }));

    let missing = h.booking.purchase_ticket(EventId::new(), 1, &buyer()).await.unwrap_err();
    assert!(matches!(missing, BookingError::NotFound(_)));
}

#[tokio::test]
async fn test_purchase_rolls_back_when_audit_fails() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Sold Nothing", 7), &admin()).await.unwrap();
    h.store.activities().fail_writes(true);

    let err = h.booking.purchase_ticket(event.id, 2, &buyer()).await.unwrap_err();

    assert_eq!(err, BookingError::audit_failed());
    assert_eq!(h.store.ticket_count().await, 0);
    assert_eq!(h.store.activities().count().await, 1);
}

#[tokio::test]
async fn test_status_update_with_reason_records_cancellation() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Matinee", 7), &admin()).await.unwrap();
    let ctx = buyer();
    let ticket = h.booking.purchase_ticket(event.id, 1, &ctx).await.unwrap();

    let cancelled = h
        .booking
        .update_ticket_status(
            ticket.id,
            TicketStatus::Cancelled,
            Some("cannot attend".to_string()),
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, TicketStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("cannot attend"));
    assert!(cancelled.cancelled_at.is_some());

    let entries = h.store.activities().all().await;
    let entry = entries
        .iter()
        .find(|a| a.action == ActionType::UpdateTicketStatus)
        .unwrap();
    assert_eq!(
        entry.details.as_deref(),
        Some(format!("Ticket Status updated to 'cancelled'. Ticket Code: {}", ticket.ticket_code).as_str())
    );
    assert_eq!(entry.old_value.as_ref().unwrap()["status"], "active");
    assert_eq!(entry.new_value.as_ref().unwrap()["status"], "cancelled");
}

#[tokio::test]
async fn test_status_update_without_reason_leaves_cancellation_empty() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Premiere", 7), &admin()).await.unwrap();
    let ctx = buyer();
    let ticket = h.booking.purchase_ticket(event.id, 1, &ctx).await.unwrap();

    let used = h
        .booking
        .update_ticket_status(ticket.id, TicketStatus::Used, None, &ctx)
        .await
        .unwrap();

    assert_eq!(used.status, TicketStatus::Used);
    assert!(used.cancelled_at.is_none());
    assert!(used.cancel_reason.is_none());
}

#[tokio::test]
async fn test_status_update_rolls_back_when_audit_fails() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Encore", 7), &admin()).await.unwrap();
    let ctx = buyer();
    let ticket = h.booking.purchase_ticket(event.id, 1, &ctx).await.unwrap();

    h.store.activities().fail_writes(true);
    let err = h
        .booking
        .update_ticket_status(ticket.id, TicketStatus::Expired, None, &ctx)
        .await
        .unwrap_err();

    assert_eq!(err, BookingError::audit_failed());
    assert_eq!(h.booking.get_ticket(ticket.id).await.unwrap().status, TicketStatus::Active);
}

#[tokio::test]
async fn test_delete_ticket_audits_old_snapshot() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Last Call", 7), &admin()).await.unwrap();
    let ctx = buyer();
    let ticket = h.booking.purchase_ticket(event.id, 1, &ctx).await.unwrap();

    h.booking.delete_ticket(ticket.id, &ctx).await.unwrap();

    assert_eq!(h.store.ticket_count().await, 0);
    let err = h.booking.get_ticket(ticket.id).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));

    let entries = h.store.activities().all().await;
    let entry = entries.iter().find(|a| a.action == ActionType::DeleteTicket).unwrap();
    assert_eq!(entry.old_value.as_ref().unwrap()["ticket_code"], ticket.ticket_code.as_str());
}

#[tokio::test]
async fn test_user_tickets_are_scoped_and_paged() {
    let h = Harness::new();
    let event = h.booking.create_event(new_event("Marathon", 7), &admin()).await.unwrap();
    let bob = buyer();
    let carol = ActivityLogContext::new(UserId::new(), "carol", None);
    for _ in 0..12 {
        h.booking.purchase_ticket(event.id, 1, &bob).await.unwrap();
    }
    h.booking.purchase_ticket(event.id, 2, &carol).await.unwrap();

    let bob_id = bob.user_id.unwrap();
    let page = h.booking.list_user_tickets(bob_id, 2, 5, &bob).await.unwrap();

    assert_eq!(page.total, 12);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 5);
    assert!(page.items.iter().all(|t| t.user_id == bob_id));

    let entries = h.store.activities().all().await;
    assert!(entries.iter().any(|a| a.action == ActionType::ViewTickets
        && a.resource_id.as_deref() == Some(bob_id.to_string().as_str())));
}
