//! Activity trail read side: filtering, pagination, summaries, alerts and
//! retention.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use ticketbook_auth::audit::{ActivityId, ActivityTrail, MAX_PAGE_SIZE};
use ticketbook_auth::mocks::MockActivityRepository;
use ticketbook_auth::{
    ActionType, Activity, ActivityFilter, ActivityRepository, AuthError, NewActivity,
    ResourceType, UserId,
};

fn trail() -> (ActivityTrail<MockActivityRepository>, MockActivityRepository) {
    let repo = MockActivityRepository::new();
    (
        ActivityTrail::new(repo.clone(), std::time::Duration::from_secs(1)),
        repo,
    )
}

fn entry_at(
    user_id: Option<UserId>,
    action: ActionType,
    resource_type: ResourceType,
    timestamp: DateTime<Utc>,
) -> Activity {
    Activity {
        id: ActivityId::new(),
        user_id,
        username: "tester".to_string(),
        action,
        resource_type,
        resource_id: None,
        timestamp,
        ip_address: Some("192.168.1.10".to_string()),
        details: None,
        old_value: None,
        new_value: None,
    }
}

async fn seed(repo: &MockActivityRepository, entries: Vec<Activity>) {
    for entry in entries {
        repo.create(&entry).await.unwrap();
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Append
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_append_stamps_id_and_timestamp() {
    let (trail, repo) = trail();
    let before = Utc::now();

    let stored = trail
        .append(
            NewActivity::new(ActionType::ViewEvents, ResourceType::Event)
                .with_actor(None, "visitor")
                .with_details("Listed events"),
        )
        .await
        .unwrap();

    assert!(stored.timestamp >= before);
    assert_eq!(repo.all().await, vec![stored]);
}

#[tokio::test]
async fn test_append_requires_username() {
    let (trail, repo) = trail();

    let err = trail
        .append(NewActivity::new(ActionType::Login, ResourceType::User).with_actor(None, "  "))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(repo.count().await, 0);
}

#[tokio::test]
async fn test_record_swallows_store_failure() {
    let (trail, repo) = trail();
    repo.fail_writes(true);

    let recorded = trail
        .record(NewActivity::new(ActionType::Login, ResourceType::User).with_actor(None, "alice"))
        .await;

    assert!(recorded.is_none());
    assert!(trail
        .append(NewActivity::new(ActionType::Login, ResourceType::User).with_actor(None, "alice"))
        .await
        .is_err());
}

// ═══════════════════════════════════════════════════════════════════════
// Filtering and pagination
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_list_newest_first_with_filters() {
    let (trail, repo) = trail();
    let alice = UserId::new();
    let now = Utc::now();

    let mut old = entry_at(Some(alice), ActionType::Login, ResourceType::User, now - Duration::hours(2));
    old.details = Some("Morning login".to_string());
    let mut recent = entry_at(Some(alice), ActionType::Login, ResourceType::User, now);
    recent.ip_address = Some("10.0.0.5".to_string());
    let other = entry_at(None, ActionType::CreateEvent, ResourceType::Event, now - Duration::hours(1));
    seed(&repo, vec![old.clone(), recent.clone(), other.clone()]).await;

    let page = trail.list(ActivityFilter::new()).await.unwrap();
    let ids: Vec<_> = page.activities.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![recent.id, other.id, old.id]);

    let page = trail.list(ActivityFilter::new().user(alice)).await.unwrap();
    assert_eq!(page.total, 2);

    let page = trail
        .list(ActivityFilter::new().resource_type(ResourceType::Event))
        .await
        .unwrap();
    assert_eq!(page.activities[0].id, other.id);

    let page = trail.list(ActivityFilter::new().ip_address("10.0")).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.activities[0].id, recent.id);

    let page = trail.list(ActivityFilter::new().search("MORNING")).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.activities[0].id, old.id);

    // Inclusive on both ends.
    let page = trail
        .list(ActivityFilter::new().between(Some(old.timestamp), Some(other.timestamp)))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_list_clamps_page_size() {
    let (trail, repo) = trail();
    let now = Utc::now();
    let entries = (0..105)
        .map(|i| entry_at(None, ActionType::ViewTickets, ResourceType::Ticket, now - Duration::seconds(i)))
        .collect();
    seed(&repo, entries).await;

    let page = trail.list(ActivityFilter::new().page(1, 500)).await.unwrap();
    assert_eq!(page.page_size, MAX_PAGE_SIZE);
    assert_eq!(page.activities.len(), 100);
    assert_eq!(page.total_pages, 2);

    let page = trail.list(ActivityFilter::new().page(0, 0)).await.unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.activities.len(), 10);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pages_partition_results(count in 0usize..60, page_size in 1u32..15) {
        tokio_test::block_on(async {
            let (trail, repo) = trail();
            let now = Utc::now();
            let entries = (0..count)
                .map(|i| {
                    entry_at(
                        None,
                        ActionType::Login,
                        ResourceType::User,
                        now - Duration::seconds(i64::try_from(i).unwrap()),
                    )
                })
                .collect();
            seed(&repo, entries).await;

            let first = trail.list(ActivityFilter::new().page(1, page_size)).await.unwrap();
            let mut seen = HashSet::new();
            for page in 1..=first.total_pages.max(1) {
                let page = u32::try_from(page).unwrap();
                let result = trail
                    .list(ActivityFilter::new().page(page, page_size))
                    .await
                    .unwrap();
                prop_assert!(result.activities.len() <= page_size as usize);
                for activity in result.activities {
                    prop_assert!(seen.insert(activity.id));
                }
            }
            prop_assert_eq!(seen.len() as u64, first.total);
            prop_assert_eq!(first.total, count as u64);
            Ok(())
        })?;
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Summaries
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_summary_counts_buckets() {
    let (trail, repo) = trail();
    let alice = UserId::new();
    let now = Utc::now();
    let newest = now - Duration::minutes(1);

    seed(
        &repo,
        vec![
            entry_at(Some(alice), ActionType::Login, ResourceType::User, now - Duration::hours(3)),
            entry_at(Some(alice), ActionType::CreateEvent, ResourceType::Event, now - Duration::hours(2)),
            entry_at(Some(alice), ActionType::UpdateTicketStatus, ResourceType::Ticket, now - Duration::hours(1)),
            entry_at(Some(alice), ActionType::PurchaseTicket, ResourceType::Ticket, newest),
            // Outside the window.
            entry_at(Some(alice), ActionType::DeleteEvent, ResourceType::Event, now - Duration::days(40)),
            // Someone else.
            entry_at(Some(UserId::new()), ActionType::Login, ResourceType::User, now),
        ],
    )
    .await;

    let summary = trail.summarize(alice, 30).await.unwrap();
    assert_eq!(summary.total_activities, 4);
    assert_eq!(summary.login_count, 1);
    assert_eq!(summary.create_count, 2);
    assert_eq!(summary.update_count, 1);
    assert_eq!(summary.delete_count, 0);
    assert_eq!(summary.last_activity, Some(newest));
    assert_eq!(summary.most_accessed_resource, Some(ResourceType::Ticket));

    let all_time = trail.summarize(alice, 0).await.unwrap();
    assert_eq!(all_time.total_activities, 5);
    assert_eq!(all_time.delete_count, 1);
    assert_eq!(all_time.period_days, None);
}

#[tokio::test]
async fn test_summary_tie_goes_to_most_recent_resource() {
    let (trail, repo) = trail();
    let alice = UserId::new();
    let now = Utc::now();

    seed(
        &repo,
        vec![
            entry_at(Some(alice), ActionType::CreateEvent, ResourceType::Event, now - Duration::hours(2)),
            entry_at(Some(alice), ActionType::Login, ResourceType::User, now - Duration::hours(1)),
        ],
    )
    .await;

    let summary = trail.summarize(alice, 7).await.unwrap();
    assert_eq!(summary.most_accessed_resource, Some(ResourceType::User));
}

#[tokio::test]
async fn test_summary_of_idle_user_is_empty() {
    let (trail, _repo) = trail();

    let summary = trail.summarize(UserId::new(), 30).await.unwrap();

    assert_eq!(summary.total_activities, 0);
    assert_eq!(summary.last_activity, None);
    assert_eq!(summary.most_accessed_resource, None);
}

// ═══════════════════════════════════════════════════════════════════════
// Security alerts
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_security_alerts_one_per_attempt() {
    let (trail, repo) = trail();
    let now = Utc::now();
    let attempts: Vec<_> = (1..=3)
        .map(|i| entry_at(None, ActionType::FailedLoginAttempt, ResourceType::User, now - Duration::minutes(i)))
        .collect();
    seed(&repo, attempts).await;
    seed(
        &repo,
        vec![
            entry_at(None, ActionType::FailedLoginAttempt, ResourceType::User, now - Duration::hours(30)),
            entry_at(None, ActionType::Login, ResourceType::User, now - Duration::minutes(1)),
        ],
    )
    .await;

    let alerts = trail.security_alerts(Duration::hours(24), 0).await.unwrap();

    assert_eq!(alerts.len(), 3);
    assert!(alerts.iter().all(|a| a.severity == "High"));
    assert!(alerts
        .iter()
        .all(|a| a.description == "Repeated failed login attempt detected."));
    assert!(alerts.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

    let limited = trail.security_alerts(Duration::hours(24), 2).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn test_security_alerts_reject_empty_window() {
    let (trail, _repo) = trail();

    let err = trail.security_alerts(Duration::zero(), 10).await.unwrap_err();

    assert!(matches!(err, AuthError::Validation { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
// Retention
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_purge_deletes_only_older_entries() {
    let (trail, repo) = trail();
    let now = Utc::now();
    seed(
        &repo,
        vec![
            entry_at(None, ActionType::Login, ResourceType::User, now - Duration::days(3)),
            entry_at(None, ActionType::Login, ResourceType::User, now - Duration::days(2)),
            entry_at(None, ActionType::Login, ResourceType::User, now - Duration::hours(25)),
            entry_at(None, ActionType::Login, ResourceType::User, now - Duration::hours(1)),
            entry_at(None, ActionType::Login, ResourceType::User, now),
        ],
    )
    .await;

    let deleted = trail.purge(Duration::hours(24)).await.unwrap();
    assert_eq!(deleted, 3);

    let remaining = trail.list(ActivityFilter::new()).await.unwrap();
    assert_eq!(remaining.total, 2);
    assert_eq!(remaining.activities.len(), 2);
    assert!(remaining
        .activities
        .iter()
        .all(|a| a.timestamp > now - Duration::hours(24)));
}

#[tokio::test]
async fn test_purge_rejects_non_positive_period() {
    let (trail, repo) = trail();
    seed(
        &repo,
        vec![entry_at(None, ActionType::Login, ResourceType::User, Utc::now())],
    )
    .await;

    for period in [Duration::zero(), Duration::hours(-1)] {
        let err = trail.purge(period).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }), "{period}: {err:?}");
    }
    assert_eq!(trail.list(ActivityFilter::new()).await.unwrap().total, 1);
}

// ═══════════════════════════════════════════════════════════════════════
// Periods beyond the calendar
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_oversized_periods_are_rejected_not_panicking() {
    let (trail, repo) = trail();
    seed(
        &repo,
        vec![entry_at(None, ActionType::FailedLoginAttempt, ResourceType::User, Utc::now())],
    )
    .await;
    let huge = Duration::days(100_000_000);

    let err = trail.summarize(UserId::new(), 1_000_000_000).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation { .. }));

    let err = trail.summarize(UserId::new(), i64::MAX).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation { .. }));

    let err = trail.security_alerts(huge, 10).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation { .. }));

    let err = trail.purge(huge).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation { .. }));
    assert_eq!(repo.count().await, 1);
}
