//! Transaction handle
//!
//! A [`DbTransaction`] is the only way to hold an open transaction. `commit`
//! and `rollback` consume it, so committing twice or committing without a
//! transaction does not compile. Dropping an unfinished transaction rolls it
//! back.

use rusqlite::{Connection, ToSql, Transaction};
use tracing::{debug, error};

use super::error::DbResult;
use super::query::{self, QueryOutcome};

pub struct DbTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> DbTransaction<'conn> {
    pub(crate) fn begin(conn: &'conn Connection) -> DbResult<Self> {
        let tx = conn.unchecked_transaction().map_err(|e| {
            error!(action = "transaction", error = %e, "failed to begin transaction");
            e
        })?;
        debug!(action = "transaction", "transaction started");
        Ok(Self { tx })
    }

    /// Execute a parameterized statement inside this transaction
    pub fn execute_query(&self, sql: &str, params: &[&dyn ToSql]) -> DbResult<QueryOutcome> {
        query::execute(&self.tx, sql, params)
    }

    /// Run a multi-statement script inside this transaction
    pub(crate) fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.tx.execute_batch(sql)?;
        Ok(())
    }

    /// Underlying connection, for helpers that take `&Connection`
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    pub fn commit(self) -> DbResult<()> {
        self.tx.commit().map_err(|e| {
            error!(action = "transaction", error = %e, "failed to commit transaction");
            e
        })?;
        debug!(action = "transaction", "transaction committed");
        Ok(())
    }

    pub fn rollback(self) -> DbResult<()> {
        self.tx.rollback().map_err(|e| {
            error!(action = "transaction", error = %e, "failed to roll back transaction");
            e
        })?;
        debug!(action = "transaction", "transaction rolled back");
        Ok(())
    }
}
