//! Failed-receipt counters and the sticky per-user block.
//!
//! Counters are keyed by `(user, file name)`, so renaming the document
//! starts a fresh budget. The block flag is user-wide once set.

use tracing::warn;

use crate::storage::{Database, DatabaseError};

/// Outcome of recording one failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub count: i64,
    /// The user was blocked by this failure.
    pub blocked: bool,
}

#[derive(Clone)]
pub struct SuspiciousActivityTracker {
    db: Database,
    limit: i64,
}

impl SuspiciousActivityTracker {
    pub fn new(db: Database, limit: u32) -> Self {
        Self {
            db,
            limit: i64::from(limit.max(1)),
        }
    }

    pub const fn limit(&self) -> i64 {
        self.limit
    }

    /// Count a failed submission and block the user once the counter for
    /// this file name reaches the limit.
    pub async fn record_failure(
        &self,
        user_id: i64,
        username: Option<&str>,
        file_name: &str,
    ) -> Result<FailureOutcome, DatabaseError> {
        let count = self
            .db
            .increment_suspicious(user_id, username, file_name)
            .await?;

        let blocked = count >= self.limit;
        if blocked {
            self.db.block_user(user_id).await?;
            warn!(user_id, file_name, count, "User blocked for suspicious receipts");
        }

        Ok(FailureOutcome { count, blocked })
    }

    /// Always a fresh store read.
    pub async fn is_blocked(&self, user_id: i64) -> Result<bool, DatabaseError> {
        self.db.is_user_blocked(user_id).await
    }

    pub async fn block(&self, user_id: i64) -> Result<(), DatabaseError> {
        self.db.block_user(user_id).await
    }

    /// Returns `false` when the user had no records.
    pub async fn unblock(&self, user_id: i64) -> Result<bool, DatabaseError> {
        self.db.unblock_user(user_id).await
    }

    pub async fn blocked_count(&self) -> Result<i64, DatabaseError> {
        self.db.count_blocked_users().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn tracker() -> SuspiciousActivityTracker {
        SuspiciousActivityTracker::new(Database::open_in_memory().await.unwrap(), 3)
    }

    #[tokio::test]
    async fn third_failure_blocks() {
        let tracker = tracker().await;

        let first = tracker.record_failure(7, Some("bob"), "r.pdf").await.unwrap();
        let second = tracker.record_failure(7, Some("bob"), "r.pdf").await.unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert!(!tracker.is_blocked(7).await.unwrap());

        let third = tracker.record_failure(7, Some("bob"), "r.pdf").await.unwrap();
        assert_eq!(third, FailureOutcome { count: 3, blocked: true });
        assert!(tracker.is_blocked(7).await.unwrap());
        assert!(!tracker.is_blocked(8).await.unwrap());
    }

    #[tokio::test]
    async fn renaming_resets_the_counter() {
        let tracker = tracker().await;

        tracker.record_failure(7, None, "a.pdf").await.unwrap();
        tracker.record_failure(7, None, "a.pdf").await.unwrap();
        let renamed = tracker.record_failure(7, None, "b.pdf").await.unwrap();

        assert_eq!(renamed.count, 1);
        assert!(!tracker.is_blocked(7).await.unwrap());
    }

    #[tokio::test]
    async fn block_is_user_wide_and_sticky() {
        let tracker = tracker().await;

        tracker.record_failure(7, None, "other.pdf").await.unwrap();
        for _ in 0..3 {
            tracker.record_failure(7, None, "r.pdf").await.unwrap();
        }
        // A later failure on a fresh name leaves the flag set.
        tracker.record_failure(7, None, "new.pdf").await.unwrap();
        assert!(tracker.is_blocked(7).await.unwrap());
        assert_eq!(tracker.blocked_count().await.unwrap(), 1);

        assert!(tracker.unblock(7).await.unwrap());
        assert!(!tracker.is_blocked(7).await.unwrap());
    }

    #[tokio::test]
    async fn zero_limit_is_clamped() {
        let tracker =
            SuspiciousActivityTracker::new(Database::open_in_memory().await.unwrap(), 0);
        assert_eq!(tracker.limit(), 1);
    }
}
