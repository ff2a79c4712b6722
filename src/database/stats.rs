//! Database statistics
//!
//! Row counts for the application's main tables plus the size of the database
//! file. Computed on demand, never stored.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::database::core::{ConnectionManager, DbResult};

/// Tables reported by [`Statistics::collect`]
pub const STATISTICS_TABLES: &[&str] = &["users", "events", "event_participants"];

const SIZE_QUERY: &str =
    "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Snapshot of table row counts and database size
///
/// Serializes flat, e.g. `{"event_participants":0,"events":0,"users":3,"size_mb":0.05}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    #[serde(flatten)]
    pub tables: BTreeMap<String, u64>,
    pub size_mb: f64,
}

impl Statistics {
    /// Collect a snapshot
    ///
    /// Any failing sub-query discards the counts gathered so far and returns
    /// the error.
    pub fn collect(db: &ConnectionManager<'_>) -> DbResult<Self> {
        Self::try_collect(db).map_err(|e| {
            warn!(action = "statistics", error = %e, "failed to collect statistics");
            e
        })
    }

    fn try_collect(db: &ConnectionManager<'_>) -> DbResult<Self> {
        let mut tables = BTreeMap::new();
        for table in STATISTICS_TABLES {
            tables.insert(table.to_string(), db.table_count(table)?);
        }

        let bytes: i64 = db
            .connection()?
            .query_row(SIZE_QUERY, [], |row| row.get(0))?;

        Ok(Self {
            tables,
            size_mb: round_mb(bytes.max(0) as u64),
        })
    }

    /// Row count for one of the reported tables
    pub fn count(&self, table: &str) -> Option<u64> {
        self.tables.get(table).copied()
    }
}

/// Megabytes rounded to two decimals
fn round_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::core::DatabasePool;
    use rusqlite::params;
    use tempfile::tempdir;

    const SCHEMA_SCRIPT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/schema/schema.sql");

    #[test]
    fn test_statistics_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.sqlite3");
        let mut config = DatabaseConfig::for_path(path.to_str().unwrap());
        config.schema_path = SCHEMA_SCRIPT.to_string();
        let pool = DatabasePool::new(&config);
        let db = pool.manager();
        db.initialize_schema().unwrap();

        for name in ["alice", "bob", "carol"] {
            db.execute_query(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, 'x')",
                params![name, format!("{}@example.com", name)],
            )
            .unwrap();
        }

        let stats = db.statistics().unwrap();
        assert_eq!(stats.count("users"), Some(3));
        assert_eq!(stats.count("events"), Some(0));
        assert_eq!(stats.count("event_participants"), Some(0));
        assert_eq!(stats.tables.len(), 3);
        assert!(stats.size_mb >= 0.0);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["users"], 3);
        assert_eq!(json["events"], 0);
        assert!(json["size_mb"].is_number());
    }

    #[test]
    fn test_statistics_fail_without_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.sqlite3");
        let pool = DatabasePool::new(&DatabaseConfig::for_path(path.to_str().unwrap()));

        assert!(pool.manager().statistics().is_err());
    }

    #[test]
    fn test_round_mb() {
        assert_eq!(round_mb(0), 0.0);
        assert_eq!(round_mb(1024 * 1024), 1.0);
        assert_eq!(round_mb(1024 * 1024 + 1024 * 512), 1.5);
        assert_eq!(round_mb(4096), 0.0);
    }
}
