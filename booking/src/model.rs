//! Domain types for events and tickets.

use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ticketbook_auth::UserId;
use ticketbook_auth::audit::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| BookingError::validation(format!("invalid event id '{s}'")))
    }
}

/// Unique identifier for a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| BookingError::validation(format!("invalid ticket id '{s}'")))
    }
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle status of an event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Open for booking
    #[default]
    Active,
    /// Currently taking place
    Ongoing,
    /// Over
    Finished,
    /// Called off
    Cancelled,
}

impl EventStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ongoing => "ongoing",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "ongoing" => Ok(Self::Ongoing),
            "finished" => Ok(Self::Finished),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(BookingError::validation(format!("unknown event status '{other}'"))),
        }
    }
}

/// A bookable event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Event name
    pub name: String,
    /// Long description
    pub description: String,
    /// Category label (concert, conference, ...)
    pub category: String,
    /// Venue name
    pub venue: String,
    /// Start time
    pub start_date: DateTime<Utc>,
    /// End time
    pub end_date: DateTime<Utc>,
    /// Seats on sale
    pub capacity: u32,
    /// Ticket price in minor currency units
    pub price_cents: i64,
    /// Lifecycle status
    pub status: EventStatus,
    /// Listed flag
    pub is_active: bool,
    /// Creator
    pub created_by: UserId,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Whether tickets can be bought for this event.
    #[must_use]
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.status == EventStatus::Active
    }
}

/// Data for a new event.
#[derive(Clone, Debug, Deserialize)]
pub struct NewEvent {
    /// Event name
    pub name: String,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Category label
    pub category: String,
    /// Venue name
    pub venue: String,
    /// Start time
    pub start_date: DateTime<Utc>,
    /// End time
    pub end_date: DateTime<Utc>,
    /// Seats on sale
    pub capacity: u32,
    /// Ticket price in minor currency units
    pub price_cents: i64,
}

impl NewEvent {
    /// Check every field rule, reporting all failures at once.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] listing each failed rule.
    pub fn validate(&self) -> Result<()> {
        let mut details = Vec::new();
        if self.name.trim().is_empty() {
            details.push("name: must not be empty".to_string());
        }
        if self.category.trim().is_empty() {
            details.push("category: must not be empty".to_string());
        }
        if self.venue.trim().is_empty() {
            details.push("venue: must not be empty".to_string());
        }
        if self.end_date < self.start_date {
            details.push("end_date: must not be before start_date".to_string());
        }
        if self.price_cents < 0 {
            details.push("price: must not be negative".to_string());
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(BookingError::Validation {
                message: "invalid event".to_string(),
                details,
            })
        }
    }

    /// Materialize the event for `creator`.
    #[must_use]
    pub fn into_event(self, creator: UserId) -> Event {
        let now = Utc::now();
        Event {
            id: EventId::new(),
            name: self.name.trim().to_string(),
            description: self.description,
            category: self.category.trim().to_string(),
            venue: self.venue.trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            capacity: self.capacity,
            price_cents: self.price_cents,
            status: EventStatus::Active,
            is_active: true,
            created_by: creator,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial event update. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventChanges {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New venue
    pub venue: Option<String>,
    /// New start time
    pub start_date: Option<DateTime<Utc>>,
    /// New end time
    pub end_date: Option<DateTime<Utc>>,
    /// New capacity
    pub capacity: Option<u32>,
    /// New price in minor units
    pub price_cents: Option<i64>,
    /// New status
    pub status: Option<EventStatus>,
    /// New listed flag
    pub is_active: Option<bool>,
}

impl EventChanges {
    /// Apply present fields to `event`, returning whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if the result would be invalid.
    pub fn apply(self, event: &mut Event) -> Result<bool> {
        let before = event.clone();

        if let Some(name) = self.name {
            event.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(category) = self.category {
            event.category = category.trim().to_string();
        }
        if let Some(venue) = self.venue {
            event.venue = venue.trim().to_string();
        }
        if let Some(start_date) = self.start_date {
            event.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            event.end_date = end_date;
        }
        if let Some(capacity) = self.capacity {
            event.capacity = capacity;
        }
        if let Some(price_cents) = self.price_cents {
            event.price_cents = price_cents;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(is_active) = self.is_active {
            event.is_active = is_active;
        }

        NewEvent {
            name: event.name.clone(),
            description: String::new(),
            category: event.category.clone(),
            venue: event.venue.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            capacity: event.capacity,
            price_cents: event.price_cents,
        }
        .validate()?;

        Ok(*event != before)
    }
}

/// Query over events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct EventFilter {
    /// Exact category.
    pub category: Option<String>,
    /// Exact status.
    pub status: Option<EventStatus>,
    /// Inclusive lower bound on the start time.
    pub starts_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the start time.
    pub starts_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring of name, description or venue.
    pub search: Option<String>,
    /// 1-based page number; 0 means the first page.
    #[serde(default)]
    pub page: u32,
    /// Page size; 0 means the default.
    #[serde(default)]
    pub page_size: u32,
}

impl EventFilter {
    /// Match everything, first page, default size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp page and page size into range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        (self.page, self.page_size) = normalize_page(self.page, self.page_size);
        self
    }

    /// Rows to skip for the current page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }

    /// Whether `event` passes every set criterion.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.category.as_ref().is_some_and(|c| *c != event.category) {
            return false;
        }
        if self.status.is_some_and(|s| s != event.status) {
            return false;
        }
        if self.starts_after.is_some_and(|t| event.start_date < t) {
            return false;
        }
        if self.starts_before.is_some_and(|t| event.start_date > t) {
            return false;
        }
        if let Some(text) = &self.search {
            let needle = text.to_lowercase();
            let found = [&event.name, &event.description, &event.venue]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

/// Clamp `(page, page_size)`: page defaults to 1, size defaults to 10 and is
/// capped at 100.
#[must_use]
pub fn normalize_page(page: u32, page_size: u32) -> (u32, u32) {
    let page = page.max(1);
    let page_size = match page_size {
        0 => DEFAULT_PAGE_SIZE,
        size => size.min(MAX_PAGE_SIZE),
    };
    (page, page_size)
}

// ============================================================================
// Tickets
// ============================================================================

/// Lifecycle status of a ticket
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Valid for entry
    #[default]
    Active,
    /// Scanned at the venue
    Used,
    /// Cancelled by the owner or an admin
    Cancelled,
    /// Event passed without use
    Expired,
}

impl TicketStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(BookingError::validation(format!("unknown ticket status '{other}'"))),
        }
    }
}

/// A purchased ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket ID
    pub id: TicketId,
    /// Event the ticket admits to
    pub event_id: EventId,
    /// Owner
    pub user_id: UserId,
    /// Human-facing code, unique
    pub ticket_code: String,
    /// Seats covered
    pub quantity: u32,
    /// Price per seat in minor units
    pub unit_price_cents: i64,
    /// `unit_price_cents * quantity`
    pub total_price_cents: i64,
    /// Lifecycle status
    pub status: TicketStatus,
    /// Purchase time
    pub purchase_date: DateTime<Utc>,
    /// Set when a cancellation reason is recorded
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Cancellation reason
    pub cancel_reason: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

/// `TKT-YYYYMMDD-XXXXXX`, the suffix drawn from a fresh v4 UUID.
#[must_use]
pub fn generate_ticket_code(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("TKT-{}-{suffix}", now.format("%Y%m%d"))
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matching items.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Page size used.
    pub page_size: u32,
    /// `ceil(total / page_size)`.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assemble a page from a normalized `(page, page_size)`.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(u64::from(page_size.max(1))),
        }
    }
}
