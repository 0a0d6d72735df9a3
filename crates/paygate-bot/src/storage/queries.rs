//! Ledger and suspicious-receipt queries.

use paygate_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::{SuspiciousRecord, TransactionRecord};

/// Marker file name used for blocks set by an administrator.
pub const ADMIN_BLOCK_MARKER: &str = "<admin>";

impl Database {
    // =========================================================================
    // Transaction ledger
    // =========================================================================

    /// Whether a transaction id has already been consumed.
    pub async fn transaction_exists(&self, transaction_id: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM receipt_transactions WHERE transaction_id = ?")
                .bind(transaction_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    /// Insert a transaction id only if it was never consumed.
    ///
    /// Returns `false` when another record already holds the id. This is a
    /// single statement, so concurrent claims of one id yield one winner.
    pub async fn claim_transaction(
        &self,
        transaction_id: &str,
        user_id: i64,
        now: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r"
            INSERT INTO receipt_transactions (transaction_id, user_id, used_at)
            VALUES (?, ?, ?)
            ON CONFLICT(transaction_id) DO NOTHING
            ",
        )
        .bind(transaction_id)
        .bind(user_id)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a transaction id, or re-touch the existing record's timestamp
    /// and owner.
    pub async fn upsert_transaction(
        &self,
        transaction_id: &str,
        user_id: i64,
        now: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO receipt_transactions (transaction_id, user_id, used_at)
            VALUES (?, ?, ?)
            ON CONFLICT(transaction_id) DO UPDATE SET
                used_at = excluded.used_at,
                user_id = excluded.user_id
            ",
        )
        .bind(transaction_id)
        .bind(user_id)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get a transaction record by id.
    pub async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionRecord, DatabaseError> {
        sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM receipt_transactions WHERE transaction_id = ?",
        )
        .bind(transaction_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Transaction {transaction_id}")))
    }

    /// Whether the user consumed any transaction at or after `since`.
    pub async fn has_transaction_since(
        &self,
        user_id: i64,
        since: i64,
    ) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM receipt_transactions WHERE user_id = ? AND used_at >= ? LIMIT 1",
        )
        .bind(user_id)
        .bind(since)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }

    // =========================================================================
    // Suspicious receipts
    // =========================================================================

    /// Increment (or create at 1) the failure counter for `(user_id, file_name)`
    /// and return the new count.
    pub async fn increment_suspicious(
        &self,
        user_id: i64,
        username: Option<&str>,
        file_name: &str,
    ) -> Result<i64, DatabaseError> {
        let now = unix_timestamp();

        let (count,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO suspicious_receipts
                (user_id, username, file_name, receipt_count, is_blocked, created_at, updated_at)
            VALUES (?, ?, ?, 1, 0, ?, ?)
            ON CONFLICT(user_id, file_name) DO UPDATE SET
                receipt_count = receipt_count + 1,
                updated_at = excluded.updated_at
            RETURNING receipt_count
            ",
        )
        .bind(user_id)
        .bind(username)
        .bind(file_name)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    /// Set the sticky block flag on every record of a user.
    ///
    /// A user without any record gets an administrator marker row so the
    /// flag has somewhere to live.
    pub async fn block_user(&self, user_id: i64) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query("UPDATE suspicious_receipts SET is_blocked = 1, updated_at = ? WHERE user_id = ?")
            .bind(now)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        sqlx::query(
            r"
            INSERT INTO suspicious_receipts
                (user_id, username, file_name, receipt_count, is_blocked, created_at, updated_at)
            SELECT ?, NULL, ?, 0, 1, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM suspicious_receipts WHERE user_id = ?)
            ",
        )
        .bind(user_id)
        .bind(ADMIN_BLOCK_MARKER)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Clear the block flag and failure counters of a user.
    ///
    /// Returns `false` when the user had no records.
    pub async fn unblock_user(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE suspicious_receipts SET is_blocked = 0, receipt_count = 0, updated_at = ? WHERE user_id = ?",
        )
        .bind(now)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether any record of the user carries the block flag.
    pub async fn is_user_blocked(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM suspicious_receipts WHERE user_id = ? AND is_blocked = 1 LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }

    /// List the suspicious records of a user, most recently updated first.
    pub async fn list_suspicious(
        &self,
        user_id: i64,
    ) -> Result<Vec<SuspiciousRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, SuspiciousRecord>(
            "SELECT * FROM suspicious_receipts WHERE user_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(records)
    }

    /// Number of distinct blocked users.
    pub async fn count_blocked_users(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT user_id) FROM suspicious_receipts WHERE is_blocked = 1",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(row.0)
    }
}
