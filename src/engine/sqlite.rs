// SQLite Engine Adapter
//
// Runs queries against an embedded SQLite database. A rusqlite statement
// borrows its connection, so each cursor is driven by a worker thread that
// owns the statement and hands rows over a rendezvous channel: at most one
// row is in flight, and dropping the cursor disconnects the channel, which
// makes the worker stop stepping and finalize the statement.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;
use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::config::SqliteConfig;
use crate::engine::{EngineError, EngineResult, EngineRow, EngineValue, QueryEngine, RowCursor};
use crate::query::column::{normalize_type_name, Column};

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// How cells of a column are lifted out of SQLite's storage classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Plain,
    Boolean,
    Date,
    Time,
    Timestamp,
}

impl ColumnKind {
    fn from_declared(declared_type: &str) -> Self {
        match normalize_type_name(declared_type).as_str() {
            "BOOLEAN" | "BOOL" => ColumnKind::Boolean,
            "DATE" => ColumnKind::Date,
            "TIME" => ColumnKind::Time,
            "DATETIME" | "TIMESTAMP" => ColumnKind::Timestamp,
            _ => ColumnKind::Plain,
        }
    }
}

enum CursorEvent {
    Row(EngineRow),
    Done,
    Failed(EngineError),
}

/// Engine backed by one SQLite connection. Queries are serialized on that
/// connection: a cursor holds it until it is exhausted or dropped.
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
    busy_timeout: Duration,
}

impl SqliteEngine {
    /// Open the database described by `config`
    pub fn open(config: &SqliteConfig) -> EngineResult<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| EngineError::Unavailable(format!("Failed to open SQLite database: {}", e)))?;

        conn.busy_timeout(config.busy_timeout)
            .map_err(|e| EngineError::Unavailable(format!("Failed to set busy timeout: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            busy_timeout: config.busy_timeout,
        })
    }

    pub fn open_in_memory() -> EngineResult<Self> {
        Self::open(&SqliteConfig::default())
    }

    /// Run statements that produce no result set (DDL, inserts, pragmas).
    ///
    /// A live cursor holds the connection, so this waits at most the busy
    /// timeout for it and then fails with `EngineError::Unavailable`.
    pub fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        let conn = self.conn.try_lock_for(self.busy_timeout).ok_or_else(|| {
            EngineError::Unavailable(format!(
                "connection still held by an open cursor after {:?}",
                self.busy_timeout
            ))
        })?;
        conn.execute_batch(sql)
            .map_err(|e| EngineError::Execution(e.to_string()))
    }
}

impl QueryEngine for SqliteEngine {
    fn execute(&self, sql: &str) -> EngineResult<Box<dyn RowCursor>> {
        let (meta_tx, meta_rx) = bounded::<EngineResult<Vec<Column>>>(1);
        let (row_tx, row_rx) = bounded::<CursorEvent>(0);
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        thread::Builder::new()
            .name("rowwire-sqlite-cursor".to_string())
            .spawn(move || drive_cursor(&conn, &sql, meta_tx, row_tx))
            .map_err(|e| EngineError::Unavailable(format!("Failed to spawn cursor worker: {}", e)))?;

        let columns = meta_rx
            .recv()
            .map_err(|_| EngineError::Unavailable("cursor worker exited before reporting columns".to_string()))??;

        Ok(Box::new(SqliteCursor {
            columns,
            events: row_rx,
            finished: false,
        }))
    }
}

/// Worker body: owns the connection lock and the statement for the whole
/// lifetime of one cursor.
fn drive_cursor(
    conn: &Mutex<Connection>,
    sql: &str,
    meta_tx: Sender<EngineResult<Vec<Column>>>,
    row_tx: Sender<CursorEvent>,
) {
    let conn = conn.lock();
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = meta_tx.send(Err(EngineError::Execution(e.to_string())));
            return;
        }
    };

    let columns: Vec<Column> = stmt
        .columns()
        .iter()
        .map(|c| Column::new(c.name(), c.decl_type().unwrap_or("")))
        .collect();
    let kinds: Vec<ColumnKind> = columns
        .iter()
        .map(|c| ColumnKind::from_declared(c.declared_type()))
        .collect();

    if meta_tx.send(Ok(columns)).is_err() {
        return;
    }

    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = row_tx.send(CursorEvent::Failed(EngineError::Cursor(e.to_string())));
            return;
        }
    };

    loop {
        let event = match rows.next() {
            Ok(Some(row)) => match read_row(row, &kinds) {
                Ok(values) => CursorEvent::Row(values),
                Err(e) => CursorEvent::Failed(e),
            },
            Ok(None) => CursorEvent::Done,
            Err(e) => CursorEvent::Failed(EngineError::Cursor(e.to_string())),
        };
        let last = !matches!(event, CursorEvent::Row(_));

        if row_tx.send(event).is_err() {
            debug!("SQLite cursor dropped by consumer; finalizing statement");
            return;
        }
        if last {
            return;
        }
    }
}

fn read_row(row: &rusqlite::Row<'_>, kinds: &[ColumnKind]) -> EngineResult<EngineRow> {
    let mut values = Vec::with_capacity(kinds.len());
    for (idx, kind) in kinds.iter().enumerate() {
        let value = row
            .get_ref(idx)
            .map_err(|e| EngineError::Cursor(format!("Failed to read column {}: {}", idx, e)))?;
        values.push(lift_value(value, *kind));
    }
    Ok(values)
}

/// Map one SQLite cell to an engine value, lifting text/integer cells of
/// temporal and boolean columns when they parse.
fn lift_value(value: ValueRef<'_>, kind: ColumnKind) -> EngineValue {
    match value {
        ValueRef::Null => EngineValue::Null,
        ValueRef::Integer(i) => lift_integer(i, kind).unwrap_or(EngineValue::Int64(i)),
        ValueRef::Real(f) => EngineValue::Float64(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            lift_text(&text, kind).unwrap_or(EngineValue::Text(text))
        }
        ValueRef::Blob(bytes) => EngineValue::Bytes(bytes.to_vec()),
    }
}

/// Integers in temporal columns are Unix seconds (DATE, TIMESTAMP) or
/// seconds since midnight (TIME)
fn lift_integer(i: i64, kind: ColumnKind) -> Option<EngineValue> {
    match kind {
        ColumnKind::Plain => None,
        ColumnKind::Boolean => Some(EngineValue::Boolean(i != 0)),
        ColumnKind::Date => DateTime::from_timestamp(i, 0)
            .map(|ts| ts.naive_utc())
            .filter(|ts| ts.time() == NaiveTime::MIN)
            .map(|ts| EngineValue::Date(ts.date())),
        ColumnKind::Time => u32::try_from(i)
            .ok()
            .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
            .map(EngineValue::Time),
        ColumnKind::Timestamp => DateTime::from_timestamp(i, 0).map(|ts| EngineValue::Timestamp(ts.naive_utc())),
    }
}

fn lift_text(text: &str, kind: ColumnKind) -> Option<EngineValue> {
    let text = text.trim();
    match kind {
        ColumnKind::Plain => None,
        ColumnKind::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(EngineValue::Boolean(true)),
            "false" | "f" | "0" => Some(EngineValue::Boolean(false)),
            _ => None,
        },
        ColumnKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(EngineValue::Date),
        ColumnKind::Time => TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
            .map(EngineValue::Time),
        ColumnKind::Timestamp => parse_timestamp(text),
    }
}

fn parse_timestamp(text: &str) -> Option<EngineValue> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(EngineValue::TimestampTz(ts));
    }
    if let Some(ts) = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(EngineValue::Timestamp(ts));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| EngineValue::Timestamp(date.and_time(NaiveTime::MIN)))
}

struct SqliteCursor {
    columns: Vec<Column>,
    events: Receiver<CursorEvent>,
    finished: bool,
}

impl RowCursor for SqliteCursor {
    fn columns(&self) -> EngineResult<Vec<Column>> {
        Ok(self.columns.clone())
    }

    fn advance(&mut self) -> EngineResult<Option<EngineRow>> {
        if self.finished {
            return Ok(None);
        }

        match self.events.recv() {
            Ok(CursorEvent::Row(row)) => Ok(Some(row)),
            Ok(CursorEvent::Done) => {
                self.finished = true;
                Ok(None)
            }
            Ok(CursorEvent::Failed(e)) => {
                self.finished = true;
                Err(e)
            }
            Err(_) => {
                self.finished = true;
                warn!("SQLite cursor worker disconnected without finishing");
                Err(EngineError::Unavailable("cursor worker stopped unexpectedly".to_string()))
            }
        }
    }
}
