//! Database connection management
//!
//! This module provides the per-context connection wrapper used throughout eventdb.

use once_cell::unsync::OnceCell;
use rusqlite::{Connection, ToSql};
use tracing::{debug, error, info, warn};

use super::error::{DbError, DbResult};
use super::pool::{DatabasePool, SqlitePooledConnection};
use super::query::{self, QueryOutcome};
use super::schema::{SchemaInit, SchemaManager};
use super::transaction::DbTransaction;
use super::version::SchemaVersion;
use crate::database::stats::Statistics;

/// Core database connection wrapper
///
/// A `ConnectionManager` belongs to one execution context. It checks a
/// connection out of the [`DatabasePool`] the first time one is needed and
/// keeps returning that same handle until it is dropped, at which point the
/// connection goes back to the pool. It is not `Sync`: concurrent contexts
/// each create their own manager.
pub struct ConnectionManager<'pool> {
    pool: &'pool DatabasePool,
    conn: OnceCell<SqlitePooledConnection>,
}

impl<'pool> ConnectionManager<'pool> {
    pub fn new(pool: &'pool DatabasePool) -> Self {
        Self {
            pool,
            conn: OnceCell::new(),
        }
    }

    pub fn pool(&self) -> &'pool DatabasePool {
        self.pool
    }

    /// Get the context's connection, opening it on first use
    pub fn connection(&self) -> DbResult<&Connection> {
        let conn = self.conn.get_or_try_init(|| {
            let path = &self.pool.config().path;
            match self.pool.checkout() {
                Ok(conn) => {
                    info!(action = "connect", path = %path, "database connection established");
                    Ok(conn)
                }
                Err(e) => {
                    if self.pool.config().debug {
                        error!(action = "connect", path = %path, error = %e, "database connection failed");
                    } else {
                        error!(action = "connect", "database connection failed");
                    }
                    Err(DbError::Connection(e))
                }
            }
        })?;
        Ok(&**conn)
    }

    /// Whether this context already holds a connection
    pub fn is_connected(&self) -> bool {
        self.conn.get().is_some()
    }

    /// Check that a trivial round-trip query succeeds
    ///
    /// Never fails: any error is logged and reported as `false`.
    pub fn test_connection(&self) -> bool {
        let result = self.connection().and_then(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(DbError::from)
        });

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(action = "test_connection", error = %e, "connection test failed");
                false
            }
        }
    }

    /// Execute a parameterized statement
    ///
    /// `params` must hold exactly one value per placeholder in `sql`.
    pub fn execute_query(&self, sql: &str, params: &[&dyn ToSql]) -> DbResult<QueryOutcome> {
        query::execute(self.connection()?, sql, params)
    }

    /// Start a transaction on this context's connection
    ///
    /// Transactions do not nest: starting one while another is open on the
    /// same connection fails.
    pub fn begin_transaction(&self) -> DbResult<DbTransaction<'_>> {
        DbTransaction::begin(self.connection()?)
    }

    /// Schema manager bound to this context
    pub fn schema(&self) -> SchemaManager<'_> {
        SchemaManager::new(self)
    }

    /// Idempotent schema bootstrap from the configured script
    pub fn initialize_schema(&self) -> DbResult<SchemaInit> {
        self.schema().initialize(&self.pool.config().schema_path)
    }

    /// Current schema version (baseline when unreadable)
    pub fn schema_version(&self) -> SchemaVersion {
        self.schema().schema_version()
    }

    /// Whether the schema is older than this application expects
    pub fn needs_migration(&self) -> bool {
        self.schema().needs_migration()
    }

    /// Row counts and storage size snapshot
    pub fn statistics(&self) -> DbResult<Statistics> {
        Statistics::collect(self)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> DbResult<bool> {
        let count: i64 = self.connection()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> DbResult<u64> {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", table_name.replace('"', "\"\""));
        let count: i64 = self
            .connection()?
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| {
                debug!(action = "table_count", table = table_name, error = %e, "count failed");
                e
            })?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use rusqlite::params;
    use tempfile::{tempdir, TempDir};

    fn test_pool() -> (TempDir, DatabasePool) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sqlite3");
        let pool = DatabasePool::new(&DatabaseConfig::for_path(path.to_str().unwrap()));
        (dir, pool)
    }

    fn unreachable_pool() -> (TempDir, DatabasePool) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("test.sqlite3");
        let mut config = DatabaseConfig::for_path(path.to_str().unwrap());
        config.connect_timeout_secs = 1;
        (dir, DatabasePool::new(&config))
    }

    #[test]
    fn test_connection_is_reused() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();
        assert!(!manager.is_connected());

        let first = manager.connection().unwrap() as *const Connection;
        let second = manager.connection().unwrap() as *const Connection;
        assert_eq!(first, second);
        assert_eq!(pool.state().0, 1);
    }

    #[test]
    fn test_separate_contexts_get_separate_handles() {
        let (_dir, pool) = test_pool();
        let a = pool.manager();
        let b = pool.manager();

        let first = a.connection().unwrap() as *const Connection;
        let second = b.connection().unwrap() as *const Connection;
        assert_ne!(first, second);
        assert_eq!(pool.state().0, 2);
    }

    #[test]
    fn test_connection_failure() {
        let (_dir, pool) = unreachable_pool();
        let manager = pool.manager();

        let err = manager.connection().unwrap_err();
        assert!(err.is_connection());
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_test_connection() {
        let (_dir, pool) = test_pool();
        assert!(pool.manager().test_connection());

        let (_dir, pool) = unreachable_pool();
        assert!(!pool.manager().test_connection());
    }

    #[test]
    fn test_execute_query() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();
        manager
            .execute_query("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", params![])
            .unwrap();
        let inserted = manager
            .execute_query("INSERT INTO test (name) VALUES (?1), (?2)", params!["a", "b"])
            .unwrap();
        assert_eq!(inserted.affected_rows(), 2);

        let rows = manager
            .execute_query("SELECT name FROM test ORDER BY id", params![])
            .unwrap();
        let names: Vec<_> = rows.iter().filter_map(|r| r.get_str("name")).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_parameter_mismatch_does_not_write() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();
        manager
            .execute_query("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", params![])
            .unwrap();

        let result = manager.execute_query(
            "INSERT INTO test (id, name) VALUES (?1, ?2)",
            params![1],
        );
        assert!(matches!(result, Err(DbError::ParameterMismatch { .. })));
        assert_eq!(manager.table_count("test").unwrap(), 0);
    }

    #[test]
    fn test_rollback_restores_state() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();
        manager
            .execute_query("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", params![])
            .unwrap();
        manager
            .execute_query("INSERT INTO test (name) VALUES ('kept')", params![])
            .unwrap();

        let tx = manager.begin_transaction().unwrap();
        tx.execute_query("INSERT INTO test (name) VALUES ('temp')", params![])
            .unwrap();
        tx.execute_query("UPDATE test SET name = 'changed'", params![])
            .unwrap();
        tx.execute_query("DELETE FROM test WHERE name = 'changed' AND id = 1", params![])
            .unwrap();
        tx.rollback().unwrap();

        let rows = manager
            .execute_query("SELECT id, name FROM test", params![])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().unwrap().get_str("name"), Some("kept"));
    }

    #[test]
    fn test_commit_persists() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();
        manager
            .execute_query("CREATE TABLE test (id INTEGER PRIMARY KEY)", params![])
            .unwrap();

        let tx = manager.begin_transaction().unwrap();
        tx.execute_query("INSERT INTO test (id) VALUES (1), (2)", params![])
            .unwrap();
        tx.commit().unwrap();

        // visible from another context
        assert_eq!(pool.manager().table_count("test").unwrap(), 2);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();
        manager
            .execute_query("CREATE TABLE test (id INTEGER PRIMARY KEY)", params![])
            .unwrap();

        {
            let tx = manager.begin_transaction().unwrap();
            tx.execute_query("INSERT INTO test (id) VALUES (1)", params![])
                .unwrap();
        }

        assert_eq!(manager.table_count("test").unwrap(), 0);
    }

    #[test]
    fn test_transactions_do_not_nest() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();

        let _tx = manager.begin_transaction().unwrap();
        assert!(manager.begin_transaction().is_err());
    }

    #[test]
    fn test_table_exists_and_count() {
        let (_dir, pool) = test_pool();
        let manager = pool.manager();
        manager
            .execute_query("CREATE TABLE test_table (id INTEGER PRIMARY KEY)", params![])
            .unwrap();
        manager
            .execute_query("INSERT INTO test_table (id) VALUES (1), (2), (3)", params![])
            .unwrap();

        assert!(manager.table_exists("test_table").unwrap());
        assert!(!manager.table_exists("nonexistent_table").unwrap());
        assert_eq!(manager.table_count("test_table").unwrap(), 3);
        assert!(manager.table_count("nonexistent_table").is_err());
    }
}
