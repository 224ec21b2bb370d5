//! Deadlines for persistence calls.
//!
//! Every store call made by the orchestrators is bounded so that a hung
//! connection surfaces as an error instead of pinning the request. Dropping
//! the returned future cancels the underlying call.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A bounded call did not finish in time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation} timed out after {limit:?}")]
pub struct DeadlineExceeded {
    /// Name of the store operation.
    pub operation: &'static str,
    /// Configured limit.
    pub limit: Duration,
}

/// Run `fut`, failing with `DeadlineExceeded` once `limit` elapses.
///
/// # Errors
///
/// Returns the future's own error, or `E::from(DeadlineExceeded)` when the
/// limit is reached first.
pub async fn with_deadline<F, T, E>(limit: Duration, operation: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<DeadlineExceeded>,
{
    if let Ok(result) = tokio::time::timeout(limit, fut).await {
        result
    } else {
        tracing::warn!(operation, ?limit, "Store call exceeded its deadline");
        Err(E::from(DeadlineExceeded { operation, limit }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthError;

    #[tokio::test]
    async fn slow_call_is_cut_off() {
        let result: Result<(), AuthError> = with_deadline(
            Duration::from_millis(20),
            "get_by_id",
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(AuthError::DatabaseError(msg)) if msg.contains("get_by_id")));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let result: Result<u8, AuthError> =
            with_deadline(Duration::from_secs(1), "noop", async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
