//! Mock user repository for testing.

use super::poisoned;
use crate::error::{AuthError, Result};
use crate::providers::{User, UserRepository};
use crate::state::UserId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock user repository.
///
/// Uses in-memory storage for testing. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockUserRepository {
    users: Arc<Mutex<HashMap<UserId, User>>>,
    latency: Option<Duration>,
    fail_session_writes: Arc<AtomicBool>,
}

impl MockUserRepository {
    /// Create a new mock user repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make refresh-token writes fail.
    pub fn fail_session_writes(&self, fail: bool) {
        self.fail_session_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert or replace a user directly, bypassing uniqueness checks.
    ///
    /// # Errors
    ///
    /// Returns error if the state lock is poisoned.
    pub fn insert(&self, user: User) -> Result<()> {
        self.users.lock().map_err(poisoned)?.insert(user.id, user);
        Ok(())
    }

    /// Current state of a user (for assertions).
    #[must_use]
    pub fn snapshot(&self, id: UserId) -> Option<User> {
        self.users.lock().ok()?.get(&id).cloned()
    }

    /// Number of stored users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.users.lock().map_or(0, |users| users.len())
    }

    fn find<F>(&self, what: String, pred: F) -> impl Future<Output = Result<User>> + Send + use<F>
    where
        F: Fn(&User) -> bool + Send + 'static,
    {
        let users = Arc::clone(&self.users);
        let latency = self.latency;

        async move {
            pause(latency).await;
            users
                .lock()
                .map_err(poisoned)?
                .values()
                .find(|u| pred(u))
                .cloned()
                .ok_or_else(|| AuthError::NotFound(format!("user {what} not found")))
        }
    }

    fn modify<F>(&self, id: UserId, apply: F) -> impl Future<Output = Result<()>> + Send + use<F>
    where
        F: FnOnce(&mut User) + Send + 'static,
    {
        let users = Arc::clone(&self.users);
        let latency = self.latency;

        async move {
            pause(latency).await;
            let mut guard = users.lock().map_err(poisoned)?;
            let user = guard
                .get_mut(&id)
                .ok_or_else(|| AuthError::NotFound(format!("user {id} not found")))?;
            apply(user);
            Ok(())
        }
    }
}

async fn pause(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

impl UserRepository for MockUserRepository {
    fn create_user(&self, user: &User) -> impl Future<Output = Result<User>> + Send {
        let users = Arc::clone(&self.users);
        let latency = self.latency;
        let user = user.clone();

        async move {
            pause(latency).await;
            let mut guard = users.lock().map_err(poisoned)?;

            if guard
                .values()
                .any(|u| u.username == user.username || u.email == user.email)
            {
                return Err(AuthError::validation("username or email already exists"));
            }

            guard.insert(user.id, user.clone());
            Ok(user)
        }
    }

    fn get_by_username(&self, username: &str) -> impl Future<Output = Result<User>> + Send {
        let username = username.to_string();
        self.find(format!("'{username}'"), move |u| u.username == username)
    }

    fn get_by_email(&self, email: &str) -> impl Future<Output = Result<User>> + Send {
        let email = email.to_string();
        self.find(format!("with email '{email}'"), move |u| u.email == email)
    }

    fn get_by_id(&self, id: UserId) -> impl Future<Output = Result<User>> + Send {
        self.find(id.to_string(), move |u| u.id == id)
    }

    fn update(&self, user: &User) -> impl Future<Output = Result<()>> + Send {
        let user = user.clone();
        self.modify(user.id, move |stored| {
            stored.email = user.email;
            stored.full_name = user.full_name;
            stored.password_hash = user.password_hash;
            stored.role = user.role;
            stored.is_active = user.is_active;
            stored.email_verified = user.email_verified;
            stored.updated_at = user.updated_at;
        })
    }

    fn save_refresh_token(
        &self,
        id: UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        let fail = self.fail_session_writes.load(Ordering::SeqCst);
        let digest = digest.to_string();
        let write = self.modify(id, move |stored| {
            stored.refresh_token_hash = Some(digest);
            stored.refresh_token_expires_at = Some(expires_at);
        });

        async move {
            if fail {
                return Err(AuthError::DatabaseError("session write failed".to_string()));
            }
            write.await
        }
    }

    fn clear_refresh_token(&self, id: UserId) -> impl Future<Output = Result<()>> + Send {
        self.modify(id, |stored| {
            stored.refresh_token_hash = None;
            stored.refresh_token_expires_at = None;
        })
    }

    fn save_password_reset_token(
        &self,
        id: UserId,
        digest: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        let digest = digest.to_string();
        self.modify(id, move |stored| {
            stored.password_reset_token_hash = Some(digest);
            stored.password_reset_expires_at = Some(expires_at);
        })
    }

    fn clear_password_reset_token(&self, id: UserId) -> impl Future<Output = Result<()>> + Send {
        self.modify(id, |stored| {
            stored.password_reset_token_hash = None;
            stored.password_reset_expires_at = None;
        })
    }

    fn update_last_login(
        &self,
        id: UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send {
        self.modify(id, move |stored| stored.last_login_at = Some(at))
    }
}
