//! Activity repository trait.

use crate::audit::{Activity, ActivityFilter};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::future::Future;

/// Append-only activity log storage.
pub trait ActivityRepository: Send + Sync {
    /// Store one entry as given (id and timestamp already assigned).
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn create(&self, activity: &Activity) -> impl Future<Output = Result<()>> + Send;

    /// One page of entries matching `filter`, newest first, plus the total
    /// number of matching entries.
    ///
    /// The filter arrives normalized (page ≥ 1, page size in `1..=100`).
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn list(
        &self,
        filter: &ActivityFilter,
    ) -> impl Future<Output = Result<(Vec<Activity>, u64)>> + Send;

    /// Delete entries with a timestamp strictly before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> impl Future<Output = Result<u64>> + Send;
}
