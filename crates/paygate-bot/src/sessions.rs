//! Read path for a user's issued sessions.

use chrono::{DateTime, FixedOffset, Utc};

use crate::clock::SharedClock;
use crate::storage::{AccessCode, Database, DatabaseError};

/// One issued code with its status at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub code: String,
    pub session_id: String,
    pub tariff: String,
    pub duration_minutes: i64,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl SessionStatus {
    fn from_code(code: AccessCode, now: i64) -> Self {
        let active = code.is_active_at(now);
        Self {
            expires_at: DateTime::from_timestamp(code.expires_at, 0).unwrap_or_default(),
            code: code.code,
            session_id: code.session_id,
            tariff: code.tariff,
            duration_minutes: code.duration_minutes,
            active,
        }
    }

    /// Expiry as `DD.MM.YYYY HH:MM` at `offset`.
    pub fn expires_display(&self, offset: FixedOffset) -> String {
        self.expires_at
            .with_timezone(&offset)
            .format("%d.%m.%Y %H:%M")
            .to_string()
    }
}

#[derive(Clone)]
pub struct SessionQuery {
    db: Database,
    clock: SharedClock,
}

impl SessionQuery {
    pub const fn new(db: Database, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Every session of the user, latest expiry first.
    pub async fn list(&self, user_id: i64) -> Result<Vec<SessionStatus>, DatabaseError> {
        let now = self.clock.unix();
        let codes = self.db.list_codes(user_id).await?;
        Ok(codes
            .into_iter()
            .map(|code| SessionStatus::from_code(code, now))
            .collect())
    }

    /// The active session with the latest expiry.
    pub async fn active(&self, user_id: i64) -> Result<Option<SessionStatus>, DatabaseError> {
        let now = self.clock.unix();
        let code = self.db.latest_active_code(user_id, now).await?;
        Ok(code.map(|code| SessionStatus::from_code(code, now)))
    }
}
