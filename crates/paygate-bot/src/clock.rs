//! Time source.
//!
//! Validation, issuance and session status all ask a [`Clock`] for "now" so
//! tests can pin the instant and check exact boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as Unix seconds.
    fn unix(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    unix: Arc<AtomicI64>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            unix: Arc::new(AtomicI64::new(now.timestamp())),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.unix.store(now.timestamp(), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.unix.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.unix.load(Ordering::SeqCst), 0).unwrap_or_default()
    }
}

pub type SharedClock = Arc<dyn Clock>;
