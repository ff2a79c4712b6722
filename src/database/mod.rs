//! Database module
//!
//! This module provides all database functionality for eventdb, organized into:
//!
//! - **core**: Core database infrastructure (pool, per-context connections, schema)
//! - **stats**: Row counts and storage size snapshot
//! - **maintenance**: Cleanup of expired login attempts and sessions
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/             # Foundation
//! │   ├── pool          # r2d2 pool of SQLite connections
//! │   ├── connection    # ConnectionManager (one handle per execution context)
//! │   ├── query         # Parameterized execution, result rows
//! │   ├── transaction   # DbTransaction handle
//! │   ├── schema        # Schema bootstrap and version marker
//! │   └── version       # Numeric version ordering
//! │
//! ├── stats             # Statistics snapshot
//! └── maintenance       # Explicit cleanup operation
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use eventdb::database::DatabasePool;
//! use rusqlite::params;
//!
//! let pool = DatabasePool::new(&config.database());
//!
//! // one manager per request / command / job
//! let db = pool.manager();
//! db.initialize_schema()?;
//!
//! let tx = db.begin_transaction()?;
//! tx.execute_query("INSERT INTO events (title, starts_at, created_by) VALUES (?1, ?2, ?3)",
//!     params!["Meetup", 1767225600, 1])?;
//! tx.commit()?;
//!
//! let stats = db.statistics()?;
//! ```

pub mod core;
pub mod maintenance;
pub mod stats;

pub use core::{
    needs_migration, value_to_string, ConnectionManager, DatabasePool, DbError, DbResult,
    DbTransaction, QueryOutcome, Row, SchemaDefinitions, SchemaInit, SchemaManager, SchemaStatus,
    SchemaVersion, SqlitePooledConnection, APP_SCHEMA_VERSION, BASELINE_SCHEMA_VERSION,
};
pub use maintenance::{Maintenance, MaintenanceReport};
pub use stats::{Statistics, STATISTICS_TABLES};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
