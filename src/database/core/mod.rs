//! Core database infrastructure
//!
//! This module provides the foundational database components used throughout eventdb:
//! - `DatabasePool`: process-wide SQLite connection pool
//! - `ConnectionManager`: per-context lazy connection with query and transaction helpers
//! - `DbTransaction`: transaction handle that commits or rolls back exactly once
//! - `SchemaManager`: schema bootstrap and version checks
//! - `DbError`: typed errors for every database operation

mod connection;
mod error;
mod pool;
mod query;
mod schema;
mod transaction;
mod version;

pub use connection::ConnectionManager;
pub use error::{DbError, DbResult};
pub use pool::{DatabasePool, SqlitePooledConnection};
pub use query::{value_to_string, QueryOutcome, Row};
pub use schema::{SchemaDefinitions, SchemaInit, SchemaManager, SchemaStatus};
pub use transaction::DbTransaction;
pub use version::{needs_migration, SchemaVersion, APP_SCHEMA_VERSION, BASELINE_SCHEMA_VERSION};
