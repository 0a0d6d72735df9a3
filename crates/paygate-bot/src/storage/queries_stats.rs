//! Statistics, payment, and audit queries.

use paygate_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::UserStats;

/// User counters for the admin statistics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserTotals {
    pub total: i64,
    pub new_since: i64,
}

/// Payment counters for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyPayments {
    pub count: i64,
    pub total_amount: i64,
}

impl Database {
    /// Record that a user was seen now.
    pub async fn touch_user(&self, user_id: i64) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            r"
            INSERT INTO user_stats (user_id, first_seen, last_seen)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET last_seen = excluded.last_seen
            ",
        )
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get the stats row of a user.
    pub async fn get_user_stats(&self, user_id: i64) -> Result<UserStats, DatabaseError> {
        sqlx::query_as::<_, UserStats>("SELECT * FROM user_stats WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User stats {user_id}")))
    }

    /// Total users and users first seen at or after `since`.
    pub async fn user_totals(&self, since: i64) -> Result<UserTotals, DatabaseError> {
        let (total, new_since): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN first_seen >= ? THEN 1 ELSE 0 END), 0) FROM user_stats",
        )
        .bind(since)
        .fetch_one(self.pool())
        .await?;

        Ok(UserTotals { total, new_since })
    }

    /// Log a paid issuance.
    pub async fn record_payment(
        &self,
        user_id: i64,
        amount: i64,
        tariff: &str,
    ) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query("INSERT INTO payments (user_id, amount, tariff, payment_date) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(amount)
            .bind(tariff)
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Payments recorded at or after `since`.
    pub async fn payments_since(&self, since: i64) -> Result<DailyPayments, DatabaseError> {
        let (count, total_amount): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM payments WHERE payment_date >= ?",
        )
        .bind(since)
        .fetch_one(self.pool())
        .await?;

        Ok(DailyPayments {
            count,
            total_amount,
        })
    }

    /// Append an administrator audit entry.
    pub async fn log_admin_action(&self, admin_id: i64, action: &str) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query("INSERT INTO admin_logs (admin_id, action, created_at) VALUES (?, ?, ?)")
            .bind(admin_id)
            .bind(action)
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Append a user activity entry.
    pub async fn log_user_activity(&self, user_id: i64, action: &str) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query("INSERT INTO user_activity (user_id, action, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(action)
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Admin audit entries of one administrator, oldest first.
    pub async fn admin_actions(&self, admin_id: i64) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT action FROM admin_logs WHERE admin_id = ? ORDER BY id")
                .bind(admin_id)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }

    /// Activity entries of one user, oldest first.
    pub async fn user_actions(&self, user_id: i64) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT action FROM user_activity WHERE user_id = ? ORDER BY id")
                .bind(user_id)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(a,)| a).collect())
    }
}
