//! Consumed transaction ids.

use crate::clock::SharedClock;
use crate::storage::{Database, DatabaseError};

/// Anti-replay ledger over the `receipt_transactions` table.
#[derive(Clone)]
pub struct TransactionLedger {
    db: Database,
    clock: Option<SharedClock>,
}

impl TransactionLedger {
    pub const fn new(db: Database) -> Self {
        Self { db, clock: None }
    }

    /// Stamp records with `clock` instead of the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn now(&self) -> i64 {
        self.clock
            .as_ref()
            .map_or_else(paygate_core::db::unix_timestamp, |c| c.unix())
    }

    pub async fn exists(&self, transaction_id: &str) -> Result<bool, DatabaseError> {
        self.db.transaction_exists(transaction_id).await
    }

    /// Record `transaction_id` as consumed by `user_id`.
    ///
    /// An existing record is re-stamped and re-owned instead of rejected, so
    /// this is not a replay guard on its own. Use [`Self::claim`] for that.
    pub async fn commit(&self, transaction_id: &str, user_id: i64) -> Result<(), DatabaseError> {
        self.db
            .upsert_transaction(transaction_id, user_id, self.now())
            .await
    }

    /// Consume `transaction_id` only if nobody holds it yet.
    ///
    /// Returns `false` when it was already consumed.
    pub async fn claim(&self, transaction_id: &str, user_id: i64) -> Result<bool, DatabaseError> {
        self.db
            .claim_transaction(transaction_id, user_id, self.now())
            .await
    }

    /// Whether `user_id` consumed any transaction within the last `window_secs`.
    pub async fn consumed_recently(
        &self,
        user_id: i64,
        window_secs: i64,
    ) -> Result<bool, DatabaseError> {
        self.db
            .has_transaction_since(user_id, self.now() - window_secs)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::DateTime;

    use super::*;
    use crate::clock::FixedClock;

    async fn ledger() -> (TransactionLedger, FixedClock, Database) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = FixedClock::at(DateTime::from_timestamp(1_000_000, 0).unwrap());
        let ledger = TransactionLedger::new(db.clone()).with_clock(Arc::new(clock.clone()));
        (ledger, clock, db)
    }

    #[tokio::test]
    async fn commit_upserts_owner_and_time() {
        let (ledger, clock, db) = ledger().await;

        ledger.commit("555", 1).await.unwrap();
        clock.advance_secs(60);
        ledger.commit("555", 2).await.unwrap();

        let record = db.get_transaction("555").await.unwrap();
        assert_eq!(record.user_id, 2);
        assert_eq!(record.used_at, 1_000_060);
        assert!(ledger.exists("555").await.unwrap());
    }

    #[tokio::test]
    async fn claim_has_single_winner() {
        let (ledger, _, db) = ledger().await;

        assert!(ledger.claim("777", 1).await.unwrap());
        assert!(!ledger.claim("777", 2).await.unwrap());
        assert_eq!(db.get_transaction("777").await.unwrap().user_id, 1);
    }

    #[tokio::test]
    async fn recent_consumption_window() {
        let (ledger, clock, _) = ledger().await;

        assert!(!ledger.consumed_recently(1, 3600).await.unwrap());
        ledger.claim("888", 1).await.unwrap();
        clock.advance_secs(3600);
        assert!(ledger.consumed_recently(1, 3600).await.unwrap());
        clock.advance_secs(1);
        assert!(!ledger.consumed_recently(1, 3600).await.unwrap());
        assert!(!ledger.consumed_recently(2, 3600).await.unwrap());
    }
}
