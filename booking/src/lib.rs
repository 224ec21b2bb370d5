//! # Ticketbook Booking
//!
//! Event and ticket flows for the ticket booking backend. Every mutation is
//! committed together with its activity entry in one transaction; if the
//! entry cannot be written, the mutation is rolled back.
//!
//! ## Architecture
//!
//! ```text
//! BookingService ──► BookingStore ──begin──► BookingTransaction
//!                                              ├─ event / ticket writes
//!                                              ├─ append_activity
//!                                              └─ commit | rollback
//! ```
//!
//! ## Example: Publish an event and sell a ticket
//!
//! ```
//! use chrono::{Duration, Utc};
//! use ticketbook_auth::{ActivityLogContext, UserId};
//! use ticketbook_booking::mocks::MockBookingStore;
//! use ticketbook_booking::{BookingConfig, BookingService, NewEvent};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let booking = BookingService::new(MockBookingStore::new(), BookingConfig::default());
//! let admin = ActivityLogContext::new(UserId::new(), "admin", None);
//!
//! let start = Utc::now() + Duration::days(14);
//! let event = booking
//!     .create_event(
//!         NewEvent {
//!             name: "Harbour Lights".into(),
//!             description: "Open-air festival".into(),
//!             category: "festival".into(),
//!             venue: "Pier 4".into(),
//!             start_date: start,
//!             end_date: start + Duration::hours(6),
//!             capacity: 2_000,
//!             price_cents: 3_500,
//!         },
//!         &admin,
//!     )
//!     .await?;
//!
//! let buyer = ActivityLogContext::new(UserId::new(), "bob", Some("198.51.100.4".into()));
//! let ticket = booking.purchase_ticket(event.id, 2, &buyer).await?;
//! assert_eq!(ticket.total_price_cents, 7_000);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod config;
pub mod error;
pub mod model;
pub mod providers;
pub mod service;
pub mod stores;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use config::BookingConfig;
pub use error::{BookingError, Result};
pub use model::{
    Event, EventChanges, EventFilter, EventId, EventStatus, NewEvent, Page, Ticket, TicketId,
    TicketStatus,
};
pub use providers::{BookingStore, BookingTransaction};
pub use service::BookingService;
