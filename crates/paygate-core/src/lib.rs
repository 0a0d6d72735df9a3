//! `Paygate` Core Library
//!
//! Shared functionality for `Paygate` components:
//! - Configuration resolution and hierarchy
//! - Tariff catalog
//! - NDJSON codec for inbound chat events and outbound replies
//! - `SQLite` pool helpers
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod ndjson;
pub mod tariff;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use tariff::{Tariff, TariffCatalog};
