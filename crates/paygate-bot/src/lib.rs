//! Paygate Bot Library
//!
//! Receipt validation and access-code issuance for a paid chat bot:
//! - `SQLite` storage for transactions, suspicious activity, codes and stats
//! - Receipt pipeline: text extraction, validation, anti-fraud tracking
//! - Access-code issuance and session queries
//! - Administrator panel state machine
//! - Event routing over an NDJSON chat transport

pub mod admin;
pub mod bot;
pub mod clock;
pub mod context;
pub mod issuer;
pub mod notify;
pub mod payment;
pub mod pipeline;
pub mod receipt;
pub mod router;
pub mod sessions;
pub mod storage;
pub mod texts;
pub mod transport;
