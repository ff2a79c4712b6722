//! Parameterized statement execution and result rows

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use super::error::{DbError, DbResult};

/// One result row: column name to value, in column order
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Value of the named column, if the column exists
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &SqlValue(value))?;
        }
        map.end()
    }
}

/// Serialization adapter for SQLite values
struct SqlValue<'a>(&'a Value);

impl Serialize for SqlValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => {
                let mut seq = serializer.serialize_seq(Some(b.len()))?;
                for byte in b {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
        }
    }
}

/// Render a value for plain-text output
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Result of an executed statement
///
/// Statements that produce columns (e.g. `SELECT`, `PRAGMA`, `... RETURNING`)
/// fill `rows`; other statements report the number of rows they changed.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    columns: Arc<[String]>,
    rows: Vec<Row>,
    affected_rows: usize,
}

impl QueryOutcome {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn affected_rows(&self) -> usize {
        self.affected_rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for QueryOutcome {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryOutcome {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Execute one parameterized statement
///
/// The number of values in `params` must equal the number of placeholders in
/// `sql`. Failures are logged together with the statement text; parameter
/// values are never logged.
pub fn execute(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> DbResult<QueryOutcome> {
    run(conn, sql, params).map_err(|e| {
        warn!(action = "query", sql = %sql, error = %e, "query failed");
        e
    })
}

fn run(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> DbResult<QueryOutcome> {
    let mut stmt = conn.prepare(sql)?;

    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(DbError::ParameterMismatch {
            expected,
            given: params.len(),
        });
    }

    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .into();

    if columns.is_empty() {
        let affected_rows = stmt.execute(params)?;
        debug!(action = "query", affected_rows, "statement executed");
        return Ok(QueryOutcome {
            columns,
            rows: Vec::new(),
            affected_rows,
        });
    }

    let width = columns.len();
    let mut rows = Vec::new();
    let mut cursor = stmt.query(params)?;
    while let Some(row) = cursor.next()? {
        let values = (0..width)
            .map(|idx| row.get::<_, Value>(idx))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(Row {
            columns: Arc::clone(&columns),
            values,
        });
    }
    drop(cursor);

    // `... RETURNING` yields exactly one row per changed row; a PRAGMA
    // assignment changes no rows even though it is not read-only
    let affected_rows = if stmt.readonly() || is_pragma(sql) {
        0
    } else {
        rows.len()
    };

    debug!(action = "query", rows = rows.len(), "query executed");
    Ok(QueryOutcome {
        columns,
        rows,
        affected_rows,
    })
}

fn is_pragma(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case("pragma"))
}
