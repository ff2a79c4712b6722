//! Database error types
//!
//! Every database operation returns [`DbError`] on failure, so callers can tell
//! "no rows" apart from "the query failed".

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// No connection could be checked out of the pool within the timeout.
    #[error("database connection failed: {0}")]
    Connection(#[from] r2d2::Error),

    /// Statement preparation, execution or transaction control failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The number of bound values does not match the statement's placeholders.
    #[error("statement expects {expected} parameter(s) but {given} were given")]
    ParameterMismatch { expected: usize, given: usize },

    /// The schema script could not be read.
    #[error("failed to read schema script '{path}': {source}")]
    SchemaScript {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A version string is not a dotted list of numbers.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
}

impl DbError {
    /// Whether this error means no database handle could be obtained at all
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }
}
