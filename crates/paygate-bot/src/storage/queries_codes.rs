//! Access code queries.

use super::db::{Database, DatabaseError};
use super::models::AccessCode;

/// Parameters for inserting a new access code.
#[derive(Debug, Clone)]
pub struct NewCode<'a> {
    pub code: &'a str,
    pub user_id: i64,
    pub session_id: &'a str,
    pub tariff: &'a str,
    pub duration_minutes: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

impl Database {
    /// Insert an access code row.
    pub async fn insert_code(&self, params: &NewCode<'_>) -> Result<AccessCode, DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO codes (code, user_id, session_id, tariff, duration_minutes, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(params.code)
        .bind(params.user_id)
        .bind(params.session_id)
        .bind(params.tariff)
        .bind(params.duration_minutes)
        .bind(params.created_at)
        .bind(params.expires_at)
        .execute(self.pool())
        .await?;

        self.get_code_by_session(params.session_id).await
    }

    /// Insert an access code only if the user has never held one.
    ///
    /// Returns `None` when the user already has a code. The existence check
    /// and the insert are one statement.
    pub async fn insert_first_code(
        &self,
        params: &NewCode<'_>,
    ) -> Result<Option<AccessCode>, DatabaseError> {
        let result = sqlx::query(
            r"
            INSERT INTO codes (code, user_id, session_id, tariff, duration_minutes, created_at, expires_at)
            SELECT ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM codes WHERE user_id = ?)
            ",
        )
        .bind(params.code)
        .bind(params.user_id)
        .bind(params.session_id)
        .bind(params.tariff)
        .bind(params.duration_minutes)
        .bind(params.created_at)
        .bind(params.expires_at)
        .bind(params.user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_code_by_session(params.session_id).await.map(Some)
    }

    /// Get a code by its session id.
    pub async fn get_code_by_session(&self, session_id: &str) -> Result<AccessCode, DatabaseError> {
        sqlx::query_as::<_, AccessCode>("SELECT * FROM codes WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Code for session {session_id}")))
    }

    /// Whether the user has ever been issued a code.
    pub async fn user_has_codes(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM codes WHERE user_id = ? LIMIT 1")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    /// All codes of a user, latest expiry first.
    pub async fn list_codes(&self, user_id: i64) -> Result<Vec<AccessCode>, DatabaseError> {
        let codes = sqlx::query_as::<_, AccessCode>(
            "SELECT * FROM codes WHERE user_id = ? ORDER BY expires_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(codes)
    }

    /// The user's active code with the latest expiry, if any.
    pub async fn latest_active_code(
        &self,
        user_id: i64,
        now: i64,
    ) -> Result<Option<AccessCode>, DatabaseError> {
        let code = sqlx::query_as::<_, AccessCode>(
            "SELECT * FROM codes WHERE user_id = ? AND expires_at > ? ORDER BY expires_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(self.pool())
        .await?;
        Ok(code)
    }
}
