//! Mock activity repository for testing.

use crate::audit::{Activity, ActivityFilter};
use crate::error::{AuthError, Result};
use crate::providers::ActivityRepository;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory activity log.
///
/// Clones share state, so a test can keep a handle for assertions while the
/// orchestrator owns another.
#[derive(Debug, Clone, Default)]
pub struct MockActivityRepository {
    activities: Arc<RwLock<Vec<Activity>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockActivityRepository {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Whether writes are currently failing.
    #[must_use]
    pub fn writes_failing(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }

    /// Get all entries in insertion order (for testing)
    pub async fn all(&self) -> Vec<Activity> {
        self.activities.read().await.clone()
    }

    /// Get entry count
    pub async fn count(&self) -> usize {
        self.activities.read().await.len()
    }
}

impl ActivityRepository for MockActivityRepository {
    fn create(&self, activity: &Activity) -> impl Future<Output = Result<()>> + Send {
        let activities = Arc::clone(&self.activities);
        let fail = self.writes_failing();
        let activity = activity.clone();

        async move {
            if fail {
                return Err(AuthError::DatabaseError(
                    "activity store unavailable".to_string(),
                ));
            }
            activities.write().await.push(activity);
            Ok(())
        }
    }

    fn list(
        &self,
        filter: &ActivityFilter,
    ) -> impl Future<Output = Result<(Vec<Activity>, u64)>> + Send {
        let activities = Arc::clone(&self.activities);
        let filter = filter.clone();

        async move {
            let mut matching: Vec<Activity> = activities
                .read()
                .await
                .iter()
                .filter(|a| filter.matches(a))
                .cloned()
                .collect();
            // Stable: equal timestamps keep insertion order.
            matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

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

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> impl Future<Output = Result<u64>> + Send {
        let activities = Arc::clone(&self.activities);

        async move {
            let mut guard = activities.write().await;
            let before = guard.len();
            guard.retain(|a| a.timestamp >= cutoff);
            Ok((before - guard.len()) as u64)
        }
    }
}
