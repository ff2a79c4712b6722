//! Cleanup of expired ephemeral data
//!
//! Removes old login attempts and expired sessions. This is an explicit
//! operation meant to be invoked by an external scheduler (cron, a systemd
//! timer, `eventdb maintenance`); nothing on the request path triggers it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EventdbConfig;
use crate::database::core::{ConnectionManager, DbResult};

/// Rows removed by one maintenance run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub login_attempts_removed: usize,
    pub sessions_removed: usize,
}

pub struct Maintenance<'a> {
    db: &'a ConnectionManager<'a>,
    login_attempt_retention: Duration,
}

impl<'a> Maintenance<'a> {
    pub fn new(db: &'a ConnectionManager<'a>, login_attempt_retention: Duration) -> Self {
        Self {
            db,
            login_attempt_retention,
        }
    }

    pub fn from_config(db: &'a ConnectionManager<'a>, config: &EventdbConfig) -> Self {
        Self::new(db, config.login_attempt_retention())
    }

    /// Delete expired rows in one transaction
    pub fn run(&self, now: DateTime<Utc>) -> DbResult<MaintenanceReport> {
        let now_ts = now.timestamp();
        let retention = i64::try_from(self.login_attempt_retention.as_secs()).unwrap_or(i64::MAX);
        let cutoff = now_ts.saturating_sub(retention);

        let tx = self.db.begin_transaction()?;
        let login_attempts_removed = tx
            .execute_query(
                "DELETE FROM login_attempts WHERE attempted_at < ?1",
                params![cutoff],
            )?
            .affected_rows();
        let sessions_removed = tx
            .execute_query("DELETE FROM sessions WHERE expires_at < ?1", params![now_ts])?
            .affected_rows();
        tx.commit()?;

        let report = MaintenanceReport {
            login_attempts_removed,
            sessions_removed,
        };
        info!(
            action = "maintenance",
            login_attempts_removed, sessions_removed, "expired data removed"
        );
        Ok(report)
    }

    /// Like [`Maintenance::run`], but failures are logged and swallowed
    pub fn run_best_effort(&self, now: DateTime<Utc>) -> Option<MaintenanceReport> {
        match self.run(now) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(action = "maintenance", error = %e, "maintenance failed");
                None
            }
        }
    }
}
