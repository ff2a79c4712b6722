#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! eventdb - database bootstrap layer for an event-registration web application
//!
//! eventdb owns everything between the application's request handlers and its
//! SQLite database: configuration loading, a lazily-connecting pool, one
//! connection per execution context, parameterized queries, transactions,
//! idempotent schema bootstrap, schema version checks, statistics and
//! maintenance of expired data. It can be used as a library or through the
//! `eventdb` command-line tool.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (always) | Database layer and configuration | `rusqlite`, `r2d2`, `config` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | `eventdb` binary | All above + `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`config`]**: Configuration file, environment overrides, defaults
//! - **[`database`]**: Pool, connection manager, schema, statistics, maintenance
//! - **[`bootstrap`]**: Startup path shared by every entry point
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use eventdb::{bootstrap, EventdbConfig};
//! use rusqlite::params;
//!
//! let config = EventdbConfig::new(&None)?;
//! let pool = bootstrap(&config)?.pool;
//!
//! // per request
//! let db = pool.manager();
//! let rows = db.execute_query(
//!     "SELECT id, title FROM events WHERE starts_at >= ?1 ORDER BY starts_at",
//!     params![chrono::Utc::now().timestamp()],
//! )?;
//! for row in &rows {
//!     println!("{:?} {:?}", row.get_i64("id"), row.get_str("title"));
//! }
//!
//! if db.needs_migration() {
//!     eprintln!("schema {} is behind the application", db.schema_version());
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod database;

#[cfg(feature = "display")]
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

// =============================================================================
// Configuration
// =============================================================================

pub use config::{format_size, DatabaseConfig, EventdbConfig};

// =============================================================================
// Bootstrap
// =============================================================================

pub use bootstrap::{bootstrap, fatal_message, log_failure, Bootstrapped};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::{
    ConnectionManager, DatabasePool, DbError, DbResult, DbTransaction, Maintenance,
    MaintenanceReport, QueryOutcome, Row, SchemaInit, SchemaManager, SchemaStatus, SchemaVersion,
    Statistics,
};

#[cfg(feature = "display")]
pub use utils::OutputFormat;
