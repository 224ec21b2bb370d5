//! Activity log data types.

use crate::error::AuthError;
use crate::state::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Largest page the activity log will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Unique identifier for an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub Uuid);

impl ActivityId {
    /// Generate a new random `ActivityId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Closed set of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Successful login.
    Login,
    /// Session ended.
    Logout,
    /// Account created.
    RegisterUser,
    /// Profile fields changed.
    UpdateProfile,
    /// Reset link requested.
    PasswordResetRequest,
    /// Password replaced through a reset token.
    PasswordReset,
    /// Email ownership confirmed.
    EmailVerified,
    /// Refresh token rotated.
    TokenRefresh,
    /// Event created.
    CreateEvent,
    /// Event changed.
    UpdateEvent,
    /// Event list read.
    ViewEvents,
    /// Event removed.
    DeleteEvent,
    /// Ticket bought.
    #[serde(rename = "purchase-ticket")]
    PurchaseTicket,
    /// Ticket status changed.
    UpdateTicketStatus,
    /// Ticket list read.
    ViewTickets,
    /// Ticket removed.
    DeleteTicket,
    /// Summary report generated.
    SummaryReport,
    /// Per-event ticket report generated.
    TicketEventReport,
    /// Login rejected.
    FailedLoginAttempt,
    /// Request rejected by the access gate.
    UnauthorizedAccess,
    /// User role changed.
    RoleChange,
}

impl ActionType {
    /// Every action type, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::Login,
        Self::Logout,
        Self::RegisterUser,
        Self::UpdateProfile,
        Self::PasswordResetRequest,
        Self::PasswordReset,
        Self::EmailVerified,
        Self::TokenRefresh,
        Self::CreateEvent,
        Self::UpdateEvent,
        Self::ViewEvents,
        Self::DeleteEvent,
        Self::PurchaseTicket,
        Self::UpdateTicketStatus,
        Self::ViewTickets,
        Self::DeleteTicket,
        Self::SummaryReport,
        Self::TicketEventReport,
        Self::FailedLoginAttempt,
        Self::UnauthorizedAccess,
        Self::RoleChange,
    ];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::RegisterUser => "register_user",
            Self::UpdateProfile => "update_profile",
            Self::PasswordResetRequest => "password_reset_request",
            Self::PasswordReset => "password_reset",
            Self::EmailVerified => "email_verified",
            Self::TokenRefresh => "token_refresh",
            Self::CreateEvent => "create_event",
            Self::UpdateEvent => "update_event",
            Self::ViewEvents => "view_events",
            Self::DeleteEvent => "delete_event",
            Self::PurchaseTicket => "purchase-ticket",
            Self::UpdateTicketStatus => "update_ticket_status",
            Self::ViewTickets => "view_tickets",
            Self::DeleteTicket => "delete_ticket",
            Self::SummaryReport => "summary_report",
            Self::TicketEventReport => "ticket_event_report",
            Self::FailedLoginAttempt => "failed_login_attempt",
            Self::UnauthorizedAccess => "unauthorized_access",
            Self::RoleChange => "role_change",
        }
    }

    /// Summary bucket this action counts towards, if any.
    #[must_use]
    pub const fn bucket(self) -> Option<SummaryBucket> {
        match self {
            Self::Login => Some(SummaryBucket::Login),
            Self::CreateEvent | Self::PurchaseTicket => Some(SummaryBucket::Create),
            Self::UpdateEvent | Self::UpdateTicketStatus => Some(SummaryBucket::Update),
            Self::DeleteEvent | Self::DeleteTicket => Some(SummaryBucket::Delete),
            Self::SummaryReport | Self::TicketEventReport => Some(SummaryBucket::Report),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(AuthError::validation("action type is required"));
        }
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| AuthError::validation(format!("unknown action type '{s}'")))
    }
}

/// Summary counters an action can contribute to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryBucket {
    /// Logins.
    Login,
    /// Creations and purchases.
    Create,
    /// Updates.
    Update,
    /// Deletions.
    Delete,
    /// Report generation.
    Report,
}

/// Closed set of audited resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// A user account.
    User,
    /// A bookable event.
    Event,
    /// A purchased ticket.
    Ticket,
    /// A generated report.
    Report,
}

impl ResourceType {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Event => "Event",
            Self::Ticket => "Ticket",
            Self::Report => "Report",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Self::User),
            "Event" => Ok(Self::Event),
            "Ticket" => Ok(Self::Ticket),
            "Report" => Ok(Self::Report),
            "" => Err(AuthError::validation("resource type is required")),
            other => Err(AuthError::validation(format!(
                "unknown resource type '{other}'"
            ))),
        }
    }
}

/// Who is acting, and from where, for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivityLogContext {
    /// Actor, `None` before authentication.
    pub user_id: Option<UserId>,
    /// Actor's username.
    pub username: String,
    /// Source IP as reported by the edge.
    pub ip_address: Option<String>,
}

impl ActivityLogContext {
    /// Context for an authenticated actor.
    #[must_use]
    pub fn new(user_id: UserId, username: impl Into<String>, ip_address: Option<String>) -> Self {
        Self {
            user_id: Some(user_id),
            username: username.into(),
            ip_address,
        }
    }
}

/// An activity entry before the log assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    /// Actor, `None` for pre-authentication failures.
    pub user_id: Option<UserId>,
    /// Actor's username (or the attempted one).
    pub username: String,
    /// Action performed.
    pub action: ActionType,
    /// Kind of resource touched.
    pub resource_type: ResourceType,
    /// Resource touched.
    pub resource_id: Option<String>,
    /// Source IP.
    pub ip_address: Option<String>,
    /// Free-form description.
    pub details: Option<String>,
    /// Snapshot of changed fields before the action.
    pub old_value: Option<serde_json::Value>,
    /// Snapshot of changed fields after the action.
    pub new_value: Option<serde_json::Value>,
}

impl NewActivity {
    /// Entry with no actor attached yet.
    #[must_use]
    pub fn new(action: ActionType, resource_type: ResourceType) -> Self {
        Self {
            user_id: None,
            username: String::new(),
            action,
            resource_type,
            resource_id: None,
            ip_address: None,
            details: None,
            old_value: None,
            new_value: None,
        }
    }

    /// Entry attributed to the request's actor.
    #[must_use]
    pub fn from_context(
        ctx: &ActivityLogContext,
        action: ActionType,
        resource_type: ResourceType,
    ) -> Self {
        let mut entry = Self::new(action, resource_type);
        entry.user_id = ctx.user_id;
        entry.username.clone_from(&ctx.username);
        entry.ip_address.clone_from(&ctx.ip_address);
        entry
    }

    /// Set the actor.
    #[must_use]
    pub fn with_actor(mut self, user_id: Option<UserId>, username: impl Into<String>) -> Self {
        self.user_id = user_id;
        self.username = username.into();
        self
    }

    /// Set resource id
    #[must_use]
    pub fn with_resource_id(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    /// Set source IP
    #[must_use]
    pub fn with_ip(mut self, ip: Option<&str>) -> Self {
        self.ip_address = ip.map(str::to_string);
        self
    }

    /// Set details
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set old/new snapshots
    #[must_use]
    pub fn with_change(
        mut self,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }
}

/// A stored activity entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Entry ID.
    pub id: ActivityId,
    /// Actor, `None` for pre-authentication failures.
    pub user_id: Option<UserId>,
    /// Actor's username.
    pub username: String,
    /// Action performed.
    pub action: ActionType,
    /// Kind of resource touched.
    pub resource_type: ResourceType,
    /// Resource touched.
    pub resource_id: Option<String>,
    /// Write time.
    pub timestamp: DateTime<Utc>,
    /// Source IP.
    pub ip_address: Option<String>,
    /// Free-form description.
    pub details: Option<String>,
    /// Snapshot before.
    pub old_value: Option<serde_json::Value>,
    /// Snapshot after.
    pub new_value: Option<serde_json::Value>,
}

/// Query over the activity log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    /// Exact actor.
    pub user_id: Option<UserId>,
    /// Exact action.
    pub action: Option<ActionType>,
    /// Exact resource type.
    pub resource_type: Option<ResourceType>,
    /// Exact resource id.
    pub resource_id: Option<String>,
    /// Case-insensitive substring of the source IP.
    pub ip_address: Option<String>,
    /// Inclusive lower time bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub end: Option<DateTime<Utc>>,
    /// Case-insensitive substring of details or username.
    pub search: Option<String>,
    /// 1-based page number; 0 means the first page.
    pub page: u32,
    /// Page size; 0 means the default, anything above the maximum is clamped.
    pub page_size: u32,
}

impl ActivityFilter {
    /// Match everything, first page, default size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by actor
    #[must_use]
    pub const fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Filter by action
    #[must_use]
    pub const fn action(mut self, action: ActionType) -> Self {
        self.action = Some(action);
        self
    }

    /// Filter by resource type
    #[must_use]
    pub const fn resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = Some(resource_type);
        self
    }

    /// Filter by resource id
    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Filter by IP substring
    #[must_use]
    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Restrict to `[start, end]`; either side may be open.
    #[must_use]
    pub const fn between(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Free-text search
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Select a page
    #[must_use]
    pub const fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Clamp paging into range.
    ///
    /// # Examples
    ///
    /// ```
    /// # use ticketbook_auth::audit::ActivityFilter;
    /// let filter = ActivityFilter::new().page(0, 500).normalized();
    /// assert_eq!((filter.page, filter.page_size), (1, 100));
    ///
    /// let filter = ActivityFilter::new().normalized();
    /// assert_eq!((filter.page, filter.page_size), (1, 10));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.page_size = match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        self
    }

    /// Rows to skip for the current page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }

    /// Check if an entry matches every set criterion (paging ignored).
    #[must_use]
    pub fn matches(&self, activity: &Activity) -> bool {
        if let Some(user_id) = self.user_id {
            if activity.user_id != Some(user_id) {
                return false;
            }
        }

        if let Some(action) = self.action {
            if activity.action != action {
                return false;
            }
        }

        if let Some(resource_type) = self.resource_type {
            if activity.resource_type != resource_type {
                return false;
            }
        }

        if let Some(ref resource_id) = self.resource_id {
            if activity.resource_id.as_ref() != Some(resource_id) {
                return false;
            }
        }

        if let Some(ref ip) = self.ip_address {
            let needle = ip.to_lowercase();
            let hit = activity
                .ip_address
                .as_ref()
                .is_some_and(|addr| addr.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if self.start.is_some_and(|start| activity.timestamp < start) {
            return false;
        }

        if self.end.is_some_and(|end| activity.timestamp > end) {
            return false;
        }

        if let Some(ref text) = self.search {
            let needle = text.to_lowercase();
            let in_details = activity
                .details
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_details && !activity.username.to_lowercase().contains(&needle) {
                return false;
            }
        }

        true
    }
}

/// One page of activity entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityPage {
    /// Entries, newest first.
    pub activities: Vec<Activity>,
    /// Number of entries matching the filter across all pages.
    pub total: u64,
    /// Page served.
    pub page: u32,
    /// Page size applied.
    pub page_size: u32,
    /// Number of pages at this size.
    pub total_pages: u64,
}

/// Per-user activity rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    /// Subject user.
    pub user_id: UserId,
    /// Look-back window in days, `None` when unbounded.
    pub period_days: Option<i64>,
    /// Entries in the window.
    pub total_activities: u64,
    /// Logins.
    pub login_count: u64,
    /// Creations and purchases.
    pub create_count: u64,
    /// Updates.
    pub update_count: u64,
    /// Deletions.
    pub delete_count: u64,
    /// Reports generated.
    pub report_count: u64,
    /// Newest entry.
    pub last_activity: Option<DateTime<Utc>>,
    /// Resource type with the most entries.
    pub most_accessed_resource: Option<ResourceType>,
}

/// Severity attached to every security alert.
pub const ALERT_SEVERITY: &str = "High";

/// Description attached to every security alert.
pub const ALERT_DESCRIPTION: &str = "Repeated failed login attempt detected.";

/// A failed login surfaced for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityAlert {
    /// Alert ID, fresh per call.
    pub alert_id: Uuid,
    /// Underlying activity entry.
    pub activity_id: ActivityId,
    /// Targeted account, if it exists.
    pub user_id: Option<UserId>,
    /// Attempted username.
    pub username: String,
    /// Always `failed_login_attempt`.
    pub action: ActionType,
    /// Source IP.
    pub ip_address: Option<String>,
    /// When the attempt happened.
    pub timestamp: DateTime<Utc>,
    /// Fixed severity.
    pub severity: String,
    /// Fixed description.
    pub description: String,
    /// Details of the underlying entry.
    pub details: Option<String>,
}

impl From<&Activity> for SecurityAlert {
    fn from(activity: &Activity) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            activity_id: activity.id,
            user_id: activity.user_id,
            username: activity.username.clone(),
            action: activity.action,
            ip_address: activity.ip_address.clone(),
            timestamp: activity.timestamp,
            severity: ALERT_SEVERITY.to_string(),
            description: ALERT_DESCRIPTION.to_string(),
            details: activity.details.clone(),
        }
    }
}
