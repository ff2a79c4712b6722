//! Database schema management
//!
//! The schema itself lives in a SQL script (by default `schema/schema.sql`).
//! This module decides whether the script needs to run, runs it, and reads
//! and writes the schema version marker.

use serde::Serialize;
use tracing::{debug, error, info};

use super::connection::ConnectionManager;
use super::error::{DbError, DbResult};
use super::version::{self, SchemaVersion};

/// Table names the schema layer relies on
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// Table whose presence marks the schema as initialized
    pub const BASELINE_TABLE: &'static str = "users";

    /// Table holding the schema version marker
    pub const VERSION_TABLE: &'static str = "schema_version";

    /// Latest recorded version wins; `rowid` breaks ties within one second
    const SELECT_VERSION: &'static str =
        "SELECT version FROM schema_version ORDER BY applied_at DESC, rowid DESC LIMIT 1";

    const INSERT_VERSION: &'static str =
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)";
}

/// Outcome of a schema bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaInit {
    /// The baseline table already existed; nothing was executed
    AlreadyInitialized,
    /// The schema script was executed and committed
    Created,
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaStatus {
    /// Database is not initialized (baseline table missing)
    NotInitialized,

    /// Schema version matches the application
    Current { version: SchemaVersion },

    /// Schema is older than the application expects
    NeedsMigration {
        from: SchemaVersion,
        to: SchemaVersion,
    },

    /// Database was written by a newer application version
    Newer {
        database: SchemaVersion,
        application: SchemaVersion,
    },
}

/// Schema manager for one execution context
pub struct SchemaManager<'a> {
    db: &'a ConnectionManager<'a>,
}

impl<'a> SchemaManager<'a> {
    pub fn new(db: &'a ConnectionManager<'a>) -> Self {
        Self { db }
    }

    /// Idempotent bootstrap
    ///
    /// Returns immediately if the baseline table exists. Otherwise reads the
    /// script at `script_path` and executes it in a single transaction, so a
    /// failing statement leaves no partial schema behind.
    pub fn initialize(&self, script_path: &str) -> DbResult<SchemaInit> {
        if self.db.table_exists(SchemaDefinitions::BASELINE_TABLE)? {
            debug!(action = "schema_init", "schema already initialized");
            return Ok(SchemaInit::AlreadyInitialized);
        }

        let script = std::fs::read_to_string(script_path).map_err(|source| {
            error!(action = "schema_init", path = %script_path, error = %source, "failed to read schema script");
            DbError::SchemaScript {
                path: script_path.to_string(),
                source,
            }
        })?;

        self.apply_script(&script)?;
        info!(action = "schema_init", path = %script_path, "database schema initialized");
        Ok(SchemaInit::Created)
    }

    /// Execute a multi-statement script atomically
    pub fn apply_script(&self, script: &str) -> DbResult<()> {
        let tx = self.db.begin_transaction()?;
        if let Err(e) = tx.execute_batch(script) {
            error!(action = "schema_init", error = %e, "schema script failed, rolling back");
            tx.rollback()?;
            return Err(e);
        }
        tx.commit()
    }

    /// Current schema version, or the baseline when it cannot be read
    pub fn schema_version(&self) -> SchemaVersion {
        match self.read_version() {
            Ok(Some(version)) => version,
            Ok(None) => SchemaVersion::baseline(),
            Err(e) => {
                debug!(action = "schema_version", error = %e, "using baseline schema version");
                SchemaVersion::baseline()
            }
        }
    }

    /// Whether the database schema is older than this application expects
    ///
    /// Read-only: never writes the version marker and never migrates.
    pub fn needs_migration(&self) -> bool {
        version::needs_migration(&self.schema_version(), &SchemaVersion::application())
    }

    /// Check the current schema status
    pub fn check_status(&self) -> DbResult<SchemaStatus> {
        if !self.db.table_exists(SchemaDefinitions::BASELINE_TABLE)? {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current = self.schema_version();
        let application = SchemaVersion::application();

        Ok(if current == application {
            SchemaStatus::Current { version: current }
        } else if current < application {
            SchemaStatus::NeedsMigration {
                from: current,
                to: application,
            }
        } else {
            SchemaStatus::Newer {
                database: current,
                application,
            }
        })
    }

    /// Append a version marker, e.g. after a manual migration
    pub fn record_version(&self, version: &SchemaVersion) -> DbResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.db.execute_query(
            SchemaDefinitions::INSERT_VERSION,
            rusqlite::params![version.as_str(), now],
        )?;
        info!(action = "schema_version", version = %version, "schema version recorded");
        Ok(())
    }

    fn read_version(&self) -> DbResult<Option<SchemaVersion>> {
        let conn = self.db.connection()?;
        let result = conn.query_row(SchemaDefinitions::SELECT_VERSION, [], |row| {
            row.get::<_, String>(0)
        });

        match result {
            Ok(raw) => SchemaVersion::parse(&raw).map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
