//! Activity audit trail.
//!
//! Structured, append-only record of every security-relevant state change,
//! plus the read side built on it: filtered pagination, per-user summaries,
//! security alerts and retention cleanup.
//!
//! Two write paths exist:
//!
//! - [`ActivityTrail::append`] validates, stamps and stores an entry and
//!   returns any failure to the caller.
//! - [`ActivityTrail::record`] does the same but logs and counts failures
//!   instead of returning them. Auth flows use it so that an unavailable
//!   activity store never turns a successful login into an error.
//!
//! Flows that must not commit a mutation without its audit entry (event and
//! ticket changes) stamp the entry with [`prepare`] and write
//! it inside their own transaction.
//!
//! # Example
//!
//! ```
//! use ticketbook_auth::audit::{ActionType, ActivityFilter, ActivityTrail, NewActivity, ResourceType};
//! use ticketbook_auth::mocks::MockActivityRepository;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let trail = ActivityTrail::new(MockActivityRepository::new(), Duration::from_secs(1));
//!
//! trail
//!     .append(
//!         NewActivity::new(ActionType::FailedLoginAttempt, ResourceType::User)
//!             .with_actor(None, "ghost")
//!             .with_ip(Some("203.0.113.9")),
//!     )
//!     .await?;
//!
//! let page = trail.list(ActivityFilter::new().search("ghost")).await?;
//! assert_eq!(page.total, 1);
//! # Ok(())
//! # }
//! ```

mod model;

pub use model::{
    ALERT_DESCRIPTION, ALERT_SEVERITY, ActionType, Activity, ActivityFilter, ActivityId,
    ActivityLogContext, ActivityPage, ActivitySummary, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
    NewActivity, ResourceType, SecurityAlert, SummaryBucket,
};

use crate::deadline::with_deadline;
use crate::error::{AuthError, Result};
use crate::providers::ActivityRepository;
use crate::state::UserId;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Alerts returned when the caller asks for zero.
pub const DEFAULT_ALERT_LIMIT: usize = 100;

/// Validate an entry and assign its id and timestamp.
///
/// # Errors
///
/// Returns [`AuthError::Validation`] if the username is blank.
pub fn prepare(entry: NewActivity) -> Result<Activity> {
    if entry.username.trim().is_empty() {
        return Err(AuthError::validation("activity username is required"));
    }

    Ok(Activity {
        id: ActivityId::new(),
        user_id: entry.user_id,
        username: entry.username,
        action: entry.action,
        resource_type: entry.resource_type,
        resource_id: entry.resource_id,
        timestamp: Utc::now(),
        ip_address: entry.ip_address,
        details: entry.details,
        old_value: entry.old_value,
        new_value: entry.new_value,
    })
}

/// `now - period`, rejecting periods that reach before the earliest
/// representable instant.
fn since(now: DateTime<Utc>, period: Duration) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(period).ok_or_else(period_out_of_range)
}

fn period_out_of_range() -> AuthError {
    AuthError::validation("time period is out of range")
}

/// Audit rules on top of an [`ActivityRepository`].
#[derive(Debug, Clone)]
pub struct ActivityTrail<A> {
    repo: A,
    store_timeout: std::time::Duration,
}

impl<A: ActivityRepository> ActivityTrail<A> {
    /// Create a trail whose store calls are bounded by `store_timeout`.
    #[must_use]
    pub const fn new(repo: A, store_timeout: std::time::Duration) -> Self {
        Self {
            repo,
            store_timeout,
        }
    }

    /// Underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &A {
        &self.repo
    }

    /// Validate, stamp and store an entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for an invalid entry, or the store's
    /// error (including a deadline expiry) otherwise.
    pub async fn append(&self, entry: NewActivity) -> Result<Activity> {
        let activity = prepare(entry)?;
        with_deadline(self.store_timeout, "activity.create", self.repo.create(&activity)).await?;

        debug!(
            activity_id = %activity.id,
            action = %activity.action,
            username = %activity.username,
            "Activity recorded"
        );
        Ok(activity)
    }

    /// [`Self::append`], logging and counting failures instead of returning them.
    pub async fn record(&self, entry: NewActivity) -> Option<Activity> {
        let action = entry.action;
        match self.append(entry).await {
            Ok(activity) => Some(activity),
            Err(e) => {
                warn!(action = %action, error = %e, "Failed to record activity");
                metrics::counter!("ticketbook_audit_write_failures_total", "action" => action.as_str())
                    .increment(1);
                None
            }
        }
    }

    /// One page of matching entries, newest first.
    ///
    /// Page and page size are clamped (see [`ActivityFilter::normalized`]).
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn list(&self, filter: ActivityFilter) -> Result<ActivityPage> {
        let filter = filter.normalized();
        let (activities, total) =
            with_deadline(self.store_timeout, "activity.list", self.repo.list(&filter)).await?;

        Ok(ActivityPage {
            activities,
            total,
            page: filter.page,
            page_size: filter.page_size,
            total_pages: total.div_ceil(u64::from(filter.page_size)),
        })
    }

    /// Roll up a user's entries over the last `days` days (`<= 0` means all).
    ///
    /// When two resource types tie for most accessed, the one reached first
    /// while walking newest to oldest wins.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if `days` reaches past the earliest
    /// representable time, or the store's error.
    pub async fn summarize(&self, user_id: UserId, days: i64) -> Result<ActivitySummary> {
        let start = if days > 0 {
            let period = Duration::try_days(days).ok_or_else(period_out_of_range)?;
            Some(since(Utc::now(), period)?)
        } else {
            None
        };
        let filter = ActivityFilter::new().user(user_id).between(start, None);

        let mut summary = ActivitySummary {
            user_id,
            period_days: (days > 0).then_some(days),
            total_activities: 0,
            login_count: 0,
            create_count: 0,
            update_count: 0,
            delete_count: 0,
            report_count: 0,
            last_activity: None,
            most_accessed_resource: None,
        };
        // First-seen order, so ties resolve to the earliest encountered type.
        let mut per_resource: Vec<(ResourceType, u64)> = Vec::new();

        self.scan(filter, usize::MAX, |activity| {
            summary.total_activities += 1;
            if summary.last_activity.is_none_or(|last| activity.timestamp > last) {
                summary.last_activity = Some(activity.timestamp);
            }
            match activity.action.bucket() {
                Some(SummaryBucket::Login) => summary.login_count += 1,
                Some(SummaryBucket::Create) => summary.create_count += 1,
                Some(SummaryBucket::Update) => summary.update_count += 1,
                Some(SummaryBucket::Delete) => summary.delete_count += 1,
                Some(SummaryBucket::Report) => summary.report_count += 1,
                None => {}
            }
            match per_resource.iter_mut().find(|(kind, _)| *kind == activity.resource_type) {
                Some((_, count)) => *count += 1,
                None => per_resource.push((activity.resource_type, 1)),
            }
        })
        .await?;

        let mut best: Option<(ResourceType, u64)> = None;
        for (kind, count) in per_resource {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((kind, count));
            }
        }
        summary.most_accessed_resource = best.map(|(kind, _)| kind);

        Ok(summary)
    }

    /// Failed login attempts within `[now - window, now]`.
    ///
    /// Every matching entry becomes one alert; attempts are not grouped or
    /// thresholded. `limit == 0` means [`DEFAULT_ALERT_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if `window` is not positive or
    /// reaches past the earliest representable time, or the store's error.
    pub async fn security_alerts(&self, window: Duration, limit: usize) -> Result<Vec<SecurityAlert>> {
        if window <= Duration::zero() {
            return Err(AuthError::validation("time window must be positive"));
        }
        let limit = if limit == 0 { DEFAULT_ALERT_LIMIT } else { limit };

        let now = Utc::now();
        let filter = ActivityFilter::new()
            .action(ActionType::FailedLoginAttempt)
            .between(Some(since(now, window)?), Some(now));

        let mut alerts = Vec::new();
        self.scan(filter, limit, |activity| alerts.push(SecurityAlert::from(activity)))
            .await?;
        Ok(alerts)
    }

    /// Delete entries older than `older_than`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if `older_than` is not positive or
    /// reaches past the earliest representable time, or the store's error.
    pub async fn purge(&self, older_than: Duration) -> Result<u64> {
        if older_than <= Duration::zero() {
            return Err(AuthError::validation("retention period must be positive"));
        }
        let cutoff = since(Utc::now(), older_than)?;
        let deleted = with_deadline(
            self.store_timeout,
            "activity.delete_older_than",
            self.repo.delete_older_than(cutoff),
        )
        .await?;

        tracing::info!(deleted, %cutoff, "Purged old activity entries");
        Ok(deleted)
    }

    /// Walk every matching entry, newest first, up to `limit` entries.
    async fn scan<F>(&self, filter: ActivityFilter, limit: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(&Activity),
    {
        let mut seen = 0usize;
        let mut page = 1;
        loop {
            let request = filter.clone().page(page, MAX_PAGE_SIZE);
            let (rows, total) =
                with_deadline(self.store_timeout, "activity.list", self.repo.list(&request))
                    .await?;
            if rows.is_empty() {
                return Ok(());
            }
            for activity in &rows {
                if seen == limit {
                    return Ok(());
                }
                visit(activity);
                seen += 1;
            }
            if u64::try_from(seen).unwrap_or(u64::MAX) >= total {
                return Ok(());
            }
            page += 1;
        }
    }
}
