//! Application bootstrap path
//!
//! Builds the pool, proves that a connection can be opened, and makes sure the
//! schema exists. A connection failure here is fatal for the caller: nothing
//! downstream works without a database handle.

use std::error::Error;
use std::path::Path;

use tracing::{error, info, warn};

use crate::config::EventdbConfig;
use crate::database::{ensure_data_dir, DatabasePool, DbError, DbResult, SchemaInit, SchemaVersion};

/// Message shown to users when no connection can be established in non-debug mode
pub const GENERIC_CONNECTION_FAILURE: &str =
    "The database is currently unavailable. Please try again later.";

/// Result of a successful bootstrap
#[derive(Debug)]
pub struct Bootstrapped {
    pub pool: DatabasePool,
    pub schema_init: SchemaInit,
    pub needs_migration: bool,
}

/// Open the database and make sure its schema is in place
pub fn bootstrap(config: &EventdbConfig) -> DbResult<Bootstrapped> {
    let db_config = config.database();

    if let Some(parent) = Path::new(&db_config.path).parent() {
        if let Some(parent) = parent.to_str().filter(|p| !p.is_empty()) {
            if let Err(e) = ensure_data_dir(parent) {
                if db_config.debug {
                    warn!(action = "bootstrap", error = %e, "could not create database directory");
                } else {
                    warn!(action = "bootstrap", "could not create database directory");
                }
            }
        }
    }

    let pool = DatabasePool::new(&db_config);
    let (schema_init, needs_migration) = {
        let db = pool.manager();
        db.connection()?;

        let schema_init = db.initialize_schema()?;
        if schema_init == SchemaInit::Created {
            info!(action = "bootstrap", "fresh database initialized");
        }

        let needs_migration = db.needs_migration();
        if needs_migration {
            warn!(
                action = "bootstrap",
                database = %db.schema_version(),
                application = %SchemaVersion::application(),
                "database schema is older than the application; migration required"
            );
        }
        (schema_init, needs_migration)
    };

    Ok(Bootstrapped {
        pool,
        schema_init,
        needs_migration,
    })
}

/// Log a failed bootstrap, with the error detail only in debug mode
pub fn log_failure(err: &DbError, debug: bool) {
    if debug {
        error!(action = "bootstrap", error = %err, "database bootstrap failed");
    } else {
        error!(
            action = "bootstrap",
            connection = err.is_connection(),
            "database bootstrap failed"
        );
    }
}

/// User-facing message for a failed bootstrap
///
/// Debug mode shows the full error chain; otherwise connection failures get a
/// generic message and other errors their top-level description.
pub fn fatal_message(err: &DbError, debug: bool) -> String {
    if debug {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        message
    } else if err.is_connection() {
        GENERIC_CONNECTION_FAILURE.to_string()
    } else {
        "Database initialization failed.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::capture_logs;
    use std::collections::HashMap;
    use tempfile::tempdir;

    const SCHEMA_SCRIPT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/schema/schema.sql");

    fn test_config(data_dir: &str) -> EventdbConfig {
        let mut values = HashMap::new();
        values.insert("schema_path".to_string(), SCHEMA_SCRIPT.to_string());
        values.insert("connect_timeout_secs".to_string(), "1".to_string());
        EventdbConfig::from_map(&values, data_dir)
    }

    #[test]
    fn test_bootstrap_creates_schema_once() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("data");
        let config = test_config(data_dir.to_str().unwrap());

        let first = bootstrap(&config).unwrap();
        assert_eq!(first.schema_init, SchemaInit::Created);
        assert!(!first.needs_migration);
        assert!(first.pool.manager().table_exists("users").unwrap());

        // second bootstrap is a no-op on the existing schema
        let second = bootstrap(&config).unwrap();
        assert_eq!(second.schema_init, SchemaInit::AlreadyInitialized);
        let stats = second.pool.manager().statistics().unwrap();
        assert_eq!(stats.count("users"), Some(0));
    }

    #[test]
    fn test_bootstrap_connection_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let mut config = test_config(dir.path().to_str().unwrap());
        config.database_path = blocker.join("db.sqlite3").to_str().unwrap().to_string();

        let err = bootstrap(&config).unwrap_err();
        assert!(err.is_connection());
        assert_eq!(fatal_message(&err, false), GENERIC_CONNECTION_FAILURE);
        assert!(fatal_message(&err, true).starts_with("database connection failed"));
    }

    #[test]
    fn test_connection_failure_logs_no_detail_without_debug() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let mut config = test_config(dir.path().to_str().unwrap());
        config.database_path = blocker.join("db.sqlite3").to_str().unwrap().to_string();

        let mut failure = None;
        let logs = capture_logs(|| {
            let err = bootstrap(&config).unwrap_err();
            log_failure(&err, false);
            failure = Some(err);
        });

        assert!(logs.contains("database bootstrap failed"));
        assert!(!logs.contains("not-a-dir"));
        assert!(!logs.contains("unable to open"));

        let err = failure.unwrap();
        let verbose = capture_logs(|| log_failure(&err, true));
        assert!(verbose.contains("not-a-dir"));
    }

    #[test]
    fn test_fatal_message_for_other_errors() {
        let err = DbError::ParameterMismatch {
            expected: 2,
            given: 1,
        };
        assert_eq!(fatal_message(&err, false), "Database initialization failed.");
        assert!(fatal_message(&err, true).contains("expects 2 parameter(s)"));
    }
}
