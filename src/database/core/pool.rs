//! Connection pool
//!
//! `DatabasePool` is the process-wide entry point to the database. It is cheap
//! to clone and safe to share between threads; each execution context (a
//! request, a CLI command, a worker job) takes its own [`ConnectionManager`]
//! from it.

use std::time::Duration;

use r2d2::{HandleError, Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, warn};

use super::connection::ConnectionManager;
use crate::config::DatabaseConfig;

pub type SqlitePooledConnection = PooledConnection<SqliteConnectionManager>;

/// Shared pool of SQLite connections
#[derive(Clone)]
pub struct DatabasePool {
    pool: Pool<SqliteConnectionManager>,
    config: DatabaseConfig,
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("path", &self.config.path)
            .finish_non_exhaustive()
    }
}

impl DatabasePool {
    /// Create a pool for the configured database file
    ///
    /// No connection is opened here: the first checkout through
    /// [`ConnectionManager::connection`] performs the actual open, bounded by
    /// `connect_timeout_secs`.
    pub fn new(config: &DatabaseConfig) -> Self {
        let busy_timeout = config.connect_timeout();
        let manager = SqliteConnectionManager::file(&config.path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));

        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .min_idle(Some(0))
            .connection_timeout(busy_timeout.max(Duration::from_secs(1)))
            .error_handler(Box::new(OpenErrorHandler {
                debug: config.debug,
            }))
            .build_unchecked(manager);

        debug!(action = "pool", max_size = config.pool_size, "database pool created");

        Self {
            pool,
            config: config.clone(),
        }
    }

    /// Create a connection manager for one execution context
    pub fn manager(&self) -> ConnectionManager<'_> {
        ConnectionManager::new(self)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Number of (total, idle) connections currently held by the pool
    pub fn state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.connections, state.idle_connections)
    }

    pub(crate) fn checkout(&self) -> Result<SqlitePooledConnection, r2d2::Error> {
        self.pool.get()
    }
}

/// Reports failed connection attempts made by the pool
///
/// The error text carries the database path and the OS cause, so it is only
/// logged in debug mode.
#[derive(Debug)]
struct OpenErrorHandler {
    debug: bool,
}

impl HandleError<rusqlite::Error> for OpenErrorHandler {
    fn handle_error(&self, error: rusqlite::Error) {
        if self.debug {
            warn!(action = "connect", error = %error, "failed to open pooled connection");
        } else {
            debug!(action = "connect", "failed to open pooled connection");
        }
    }
}

/// Per-connection session setup, applied once when a connection is opened
fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    // Bounded wait on locks held by other connections
    conn.busy_timeout(busy_timeout)?;

    // Session character set; only takes effect on a fresh database file
    conn.execute("PRAGMA encoding = 'UTF-8'", [])?;

    // WAL lets readers proceed while another connection writes
    let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

    conn.execute("PRAGMA synchronous=NORMAL", [])?;
    conn.execute("PRAGMA foreign_keys=ON", [])?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::capture_logs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_pool_is_lazy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lazy.sqlite3");
        let config = DatabaseConfig::for_path(path.to_str().unwrap());

        let pool = DatabasePool::new(&config);
        assert_eq!(pool.state().0, 0);
        assert!(!path.exists());

        let conn = pool.checkout().unwrap();
        assert!(path.exists());
        drop(conn);
        assert_eq!(pool.state().0, 1);
    }

    #[test]
    fn test_connection_is_configured() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pragma.sqlite3");
        let pool = DatabasePool::new(&DatabaseConfig::for_path(path.to_str().unwrap()));
        let conn = pool.checkout().unwrap();

        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let journal: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal, "wal");

        let encoding: String = conn
            .query_row("PRAGMA encoding", [], |row| row.get(0))
            .unwrap();
        assert_eq!(encoding, "UTF-8");
    }

    #[test]
    fn test_open_errors_hide_detail_without_debug() {
        let secret = "/srv/private/eventdb.sqlite3";
        let error = || rusqlite::Error::InvalidPath(PathBuf::from(secret));

        let quiet = capture_logs(|| OpenErrorHandler { debug: false }.handle_error(error()));
        assert!(quiet.contains("failed to open pooled connection"));
        assert!(!quiet.contains(secret));

        let verbose = capture_logs(|| OpenErrorHandler { debug: true }.handle_error(error()));
        assert!(verbose.contains(secret));
    }

    #[test]
    fn test_unreachable_path_fails_within_timeout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("db.sqlite3");
        let mut config = DatabaseConfig::for_path(path.to_str().unwrap());
        config.connect_timeout_secs = 1;

        let pool = DatabasePool::new(&config);
        assert!(pool.checkout().is_err());
    }
}
