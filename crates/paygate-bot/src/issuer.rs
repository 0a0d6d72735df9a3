//! Access code issuance.

use paygate_core::Tariff;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::info;

use crate::clock::SharedClock;
use crate::storage::{AccessCode, Database, DatabaseError, NewCode};

/// Random bytes behind an access code (8 hex chars).
const CODE_BYTES: usize = 4;
/// Random bytes behind a session id (16 hex chars).
const SESSION_BYTES: usize = 8;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct AccessCodeIssuer {
    db: Database,
    clock: SharedClock,
}

impl AccessCodeIssuer {
    pub const fn new(db: Database, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Mint and persist a code for `tariff`, expiring `tariff.duration` from now.
    pub async fn issue(&self, user_id: i64, tariff: &Tariff) -> Result<AccessCode, DatabaseError> {
        let (code, session_id) = (random_hex(CODE_BYTES), random_hex(SESSION_BYTES));
        let params = self.new_code(&code, &session_id, user_id, tariff);

        let issued = self.db.insert_code(&params).await?;
        info!(user_id, tariff = %tariff.name, session_id = %issued.session_id, "Access code issued");
        Ok(issued)
    }

    /// Mint a code only if the user has never held one.
    ///
    /// Returns `None` for a returning user. Eligibility and insert are one
    /// store statement, so concurrent requests grant at most one code.
    pub async fn issue_first(
        &self,
        user_id: i64,
        tariff: &Tariff,
    ) -> Result<Option<AccessCode>, DatabaseError> {
        let (code, session_id) = (random_hex(CODE_BYTES), random_hex(SESSION_BYTES));
        let params = self.new_code(&code, &session_id, user_id, tariff);

        let issued = self.db.insert_first_code(&params).await?;
        if let Some(issued) = &issued {
            info!(user_id, tariff = %tariff.name, session_id = %issued.session_id, "Free access code issued");
        }
        Ok(issued)
    }

    /// A user is new until any code row exists for them.
    pub async fn is_new_user(&self, user_id: i64) -> Result<bool, DatabaseError> {
        Ok(!self.db.user_has_codes(user_id).await?)
    }

    fn new_code<'a>(
        &self,
        code: &'a str,
        session_id: &'a str,
        user_id: i64,
        tariff: &'a Tariff,
    ) -> NewCode<'a> {
        let created_at = self.clock.unix();
        NewCode {
            code,
            user_id,
            session_id,
            tariff: &tariff.name,
            duration_minutes: i64::from(tariff.duration_minutes),
            created_at,
            expires_at: created_at + tariff.duration().num_seconds(),
        }
    }
}
