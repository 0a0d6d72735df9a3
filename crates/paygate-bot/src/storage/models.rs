//! Database models for the `Paygate` bot.

use serde::{Deserialize, Serialize};

/// Issued access code.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessCode {
    pub id: i64,
    pub code: String,
    pub user_id: i64,
    pub session_id: String,
    pub tariff: String,
    pub duration_minutes: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

impl AccessCode {
    /// A code is active strictly before its expiry instant.
    pub const fn is_active_at(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// Consumed transaction id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub user_id: i64,
    pub used_at: i64,
}

/// Failed-validation counter for one (user, file name) pair.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SuspiciousRecord {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub file_name: String,
    pub receipt_count: i64,
    pub is_blocked: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserStats {
    pub user_id: i64,
    pub first_seen: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub tariff: String,
    pub payment_date: i64,
}
