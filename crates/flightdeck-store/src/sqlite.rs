// ABOUTME: Read-only SQL execution against the SQLite flights database.
// ABOUTME: Runs each query on a blocking thread with a row cap, interrupting it when the timeout elapses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};
use thiserror::Error;

/// Errors that can occur while running a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The statement is not a single read-only query.
    #[error("rejected statement: {0}")]
    Rejected(String),

    /// The statement failed to compile (syntax error, unknown table or column).
    #[error("invalid SQL: {0}")]
    InvalidSql(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The database is missing, unreadable, or failed while stepping rows.
    #[error("database error: {0}")]
    Backend(String),
}

/// Inferred kind of a result column, from the values actually returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

/// Rows returned by a query. `rows` holds at most the configured cap;
/// `total_rows` counts everything the statement produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Map<String, Value>>,
    pub total_rows: usize,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Compact digest for downstream prompts: columns, counts and the first
    /// `sample` rows.
    pub fn summary(&self, sample: usize) -> Value {
        json!({
            "columns": self.columns,
            "row_count": self.rows.len(),
            "total_rows": self.total_rows,
            "sample": self.rows.iter().take(sample).collect::<Vec<_>>(),
        })
    }
}

/// Handle to the flights database. Holds only configuration; every query
/// opens its own read-only connection, so one handle serves concurrent turns.
#[derive(Debug, Clone)]
pub struct FlightsDb {
    path: PathBuf,
    max_rows: usize,
    timeout: Duration,
}

impl FlightsDb {
    pub fn new(path: impl Into<PathBuf>, max_rows: usize, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            max_rows: max_rows.max(1),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    fn open_read_only(&self) -> Result<Connection, QueryError> {
        if !self.path.exists() {
            return Err(QueryError::Backend(format!(
                "database file not found at {}",
                self.path.display()
            )));
        }
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| QueryError::Backend(e.to_string()))
    }

    /// Run a single read-only statement. Zero rows is a success.
    pub async fn query(&self, sql: &str) -> Result<QueryResult, QueryError> {
        let sql = normalize_statement(sql)?;
        let conn = self.open_read_only()?;
        let interrupt = conn.get_interrupt_handle();
        let max_rows = self.max_rows;
        let timeout = self.timeout;

        tracing::debug!(sql = %sql, max_rows, "executing query");

        let task = tokio::task::spawn_blocking(move || run_query(&conn, &sql, max_rows, timeout));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(QueryError::Backend(format!(
                "query task failed: {}",
                join_err
            ))),
            Err(_) => {
                interrupt.interrupt();
                tracing::warn!(?timeout, "query interrupted after timeout");
                Err(QueryError::Timeout(timeout))
            }
        }
    }
}

/// Trim the statement, drop trailing semicolons, and reject anything that does
/// not start as a SELECT or WITH query. Trailing statements are caught when the
/// statement is prepared.
fn normalize_statement(sql: &str) -> Result<String, QueryError> {
    let trimmed = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if trimmed.is_empty() {
        return Err(QueryError::Rejected("empty statement".to_string()));
    }
    let keyword = trimmed
        .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if keyword != "SELECT" && keyword != "WITH" {
        return Err(QueryError::Rejected(format!(
            "only SELECT queries are allowed, got {}",
            trimmed.split_whitespace().next().unwrap_or_default()
        )));
    }
    Ok(trimmed.to_string())
}

fn is_interrupt(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted
    )
}

fn run_query(
    conn: &Connection,
    sql: &str,
    max_rows: usize,
    timeout: Duration,
) -> Result<QueryResult, QueryError> {
    let stepping_error = |e: rusqlite::Error| {
        if is_interrupt(&e) {
            QueryError::Timeout(timeout)
        } else {
            QueryError::Backend(e.to_string())
        }
    };

    let mut stmt = conn.prepare(sql).map_err(|e| match e {
        rusqlite::Error::MultipleStatement => {
            QueryError::Rejected("multiple statements are not allowed".to_string())
        }
        e if is_interrupt(&e) => QueryError::Timeout(timeout),
        e => QueryError::InvalidSql(e.to_string()),
    })?;

    if !stmt.readonly() {
        return Err(QueryError::Rejected("statement would modify the database".to_string()));
    }

    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([]).map_err(stepping_error)?;

    let mut records = Vec::new();
    let mut total_rows = 0usize;
    while let Some(row) = rows.next().map_err(stepping_error)? {
        total_rows += 1;
        if records.len() >= max_rows {
            continue;
        }
        let mut record = Map::new();
        for (index, name) in names.iter().enumerate() {
            let value = row.get_ref(index).map_err(stepping_error)?;
            record.insert(name.clone(), to_json(value));
        }
        records.push(record);
    }

    let columns = names
        .iter()
        .map(|name| ColumnInfo {
            name: name.clone(),
            kind: infer_kind(&records, name),
        })
        .collect();

    Ok(QueryResult {
        columns,
        rows: records,
        total_rows,
    })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn infer_kind(rows: &[Map<String, Value>], column: &str) -> ColumnKind {
    let mut saw_number = false;
    for row in rows {
        match row.get(column) {
            Some(Value::Number(_)) => saw_number = true,
            Some(Value::Null) | None => {}
            Some(_) => return ColumnKind::Text,
        }
    }
    if saw_number {
        ColumnKind::Numeric
    } else {
        ColumnKind::Null
    }
}
