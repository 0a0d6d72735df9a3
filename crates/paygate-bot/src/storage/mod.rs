//! `SQLite` storage for the `Paygate` bot.
//!
//! Provides persistence for issued codes, consumed transaction ids,
//! suspicious-receipt counters, and the statistics/audit tables.

mod db;
mod models;
mod queries;
mod queries_codes;
mod queries_stats;

#[cfg(test)]
mod tests;

pub use db::{Database, DatabaseError};
pub use models::*;
pub use queries::ADMIN_BLOCK_MARKER;
pub use queries_codes::NewCode;
pub use queries_stats::{DailyPayments, UserTotals};
