//! Database connection and initialization.

pub use paygate_core::db::DatabaseError;

paygate_core::define_database!(Database, "Database migrations complete");
