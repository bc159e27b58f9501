use std::thread;

use anyhow::Result;

use rowwire::engine::{EngineError, EngineValue, SqliteEngine};
use rowwire::session::{ChannelSink, CollectingSink};
use rowwire::wire::{Duration, Interval, QueryResponse, StatusCode, Timestamp, Value};
use rowwire::{materialize, Column, EngineHandle, QueryRequest, SessionConfig, SessionError, StreamingSession};

#[path = "../common/mod.rs"]
mod common;
use common::*;

const EVENTS_SCHEMA: &str = "
    CREATE TABLE events (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        day DATE,
        at_time TIME,
        created TIMESTAMP,
        active BOOLEAN,
        score REAL,
        payload BLOB
    );
    INSERT INTO events VALUES
        (1, 'world', '1992-09-20', '01:02:03.456', '1992-09-20 01:02:03.789', 1, 1.5, x'736f6d65'),
        (2, 'world2', '2023-11-01', '14:30:45.123', '2023-11-01T00:00:00Z', 0, NULL, NULL),
        (3, 'broken', 'someday', NULL, NULL, 'true', 2, x'');
";

fn events_engine() -> Result<(EngineHandle, tempfile::TempDir)> {
    let (sqlite, dir) = create_temp_sqlite()?;
    sqlite.execute_batch(EVENTS_SCHEMA)?;
    Ok((EngineHandle::new(sqlite), dir))
}

#[test]
fn test_declared_column_types_are_reported() -> Result<()> {
    let (engine, _dir) = events_engine()?;
    let doc = materialize(&engine, &QueryRequest::new("SELECT * FROM events"), &SessionConfig::default())?;

    assert_eq!(
        doc.columns(),
        &[
            Column::new("id", "INTEGER"),
            Column::new("name", "TEXT"),
            Column::new("day", "DATE"),
            Column::new("at_time", "TIME"),
            Column::new("created", "TIMESTAMP"),
            Column::new("active", "BOOLEAN"),
            Column::new("score", "REAL"),
            Column::new("payload", "BLOB"),
        ]
    );
    assert_eq!(doc.row_count(), 3);
    Ok(())
}

#[test]
fn test_typed_cells_encode_by_declared_type() -> Result<()> {
    init_logging();
    let (engine, _dir) = events_engine()?;
    let doc = materialize(
        &engine,
        &QueryRequest::new("SELECT * FROM events ORDER BY id"),
        &SessionConfig::default(),
    )?;
    let rows = doc.rows();

    assert_eq!(
        rows[0].values,
        vec![
            Value::Int64(1),
            Value::string("world"),
            Value::Timestamp(Timestamp::new(FIRST_DAY_SECONDS, 0)),
            Value::Duration(Duration::from_millis(3_723_456)),
            Value::Timestamp(Timestamp::new(716_950_923, 789_000_000)),
            Value::Bool(true),
            Value::Double(1.5),
            Value::Bytes(b"some".to_vec()),
        ]
    );

    assert_eq!(
        rows[1].values,
        vec![
            Value::Int64(2),
            Value::string("world2"),
            Value::Timestamp(Timestamp::new(SECOND_DAY_SECONDS, 0)),
            Value::Duration(Duration::from_millis(52_245_123)),
            Value::Timestamp(Timestamp::new(SECOND_DAY_SECONDS, 0)),
            Value::Bool(false),
            Value::Null,
            Value::Null,
        ]
    );

    // text that does not parse under its declared type stays text
    assert_eq!(rows[2].values[2], Value::string("someday"));
    assert_eq!(rows[2].values[3], Value::Null);
    assert_eq!(rows[2].values[5], Value::Bool(true));
    // REAL affinity stores 2 as 2.0
    assert_eq!(rows[2].values[6], Value::Double(2.0));
    assert_eq!(rows[2].values[7], Value::Bytes(vec![]));
    Ok(())
}

#[test]
fn test_expression_columns_have_no_declared_type() -> Result<()> {
    let (engine, _dir) = events_engine()?;
    let doc = materialize(
        &engine,
        &QueryRequest::new("SELECT count(*) AS n, max(day) AS latest FROM events WHERE id < 3"),
        &SessionConfig::default(),
    )?;

    assert_eq!(doc.columns(), &[Column::new("n", ""), Column::new("latest", "")]);
    // without a declared type the date is plain text
    assert_eq!(
        doc.rows()[0].values,
        vec![Value::Int64(2), Value::string("2023-11-01")]
    );
    Ok(())
}

#[test]
fn test_empty_result_has_header() -> Result<()> {
    let (engine, _dir) = events_engine()?;
    let mut sink = CollectingSink::new();
    let summary = StreamingSession::new(engine, SessionConfig::default())
        .run(&QueryRequest::new("SELECT id, name FROM events WHERE id > 100"), &mut sink)?;

    assert_eq!(summary.rows_sent, 0);
    assert_eq!(
        sink.header().map(|h| h.columns.clone()),
        Some(vec![Column::new("id", "INTEGER"), Column::new("name", "TEXT")])
    );
    assert!(sink.rows().is_empty());
    Ok(())
}

#[test]
fn test_prepare_error_is_execution_failure() -> Result<()> {
    let (engine, _dir) = events_engine()?;
    let mut sink = CollectingSink::new();
    let err = StreamingSession::new(engine.clone(), SessionConfig::default())
        .run(&QueryRequest::new("SELECT * FROM missing_table"), &mut sink)
        .unwrap_err();

    match &err {
        SessionError::Execution(EngineError::Execution(message)) => {
            assert!(message.contains("no such table"), "unexpected message: {}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.code(), StatusCode::Internal);
    assert!(sink.responses().is_empty());

    // the connection is still usable afterwards
    let doc = materialize(&engine, &QueryRequest::new("SELECT 1 AS one"), &SessionConfig::default())?;
    assert_eq!(doc.rows()[0].values, vec![Value::Int64(1)]);
    Ok(())
}

#[test]
fn test_mid_stream_failure_after_rows() -> Result<()> {
    let (sqlite, _dir) = create_temp_sqlite()?;
    sqlite.execute_batch(
        "CREATE TABLE vals (v INTEGER);
         INSERT INTO vals VALUES (1), (2), (-9223372036854775807 - 1), (4);",
    )?;
    let engine = EngineHandle::new(sqlite);

    let mut sink = CollectingSink::new();
    let err = StreamingSession::new(engine, SessionConfig::default())
        .run(&QueryRequest::new("SELECT abs(v) AS a FROM vals"), &mut sink)
        .unwrap_err();

    match &err {
        SessionError::Cursor { rows_sent, source } => {
            assert_eq!(*rows_sent, 2);
            assert!(matches!(source, EngineError::Cursor(m) if m.contains("integer overflow")));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(sink.header().is_some());
    let values: Vec<Value> = sink.rows().into_iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(values, vec![Value::Int64(1), Value::Int64(2)]);
    Ok(())
}

#[test]
fn test_dropped_cursor_releases_connection() -> Result<()> {
    let (sqlite, _dir) = create_temp_sqlite()?;
    sqlite.execute_batch(
        "CREATE TABLE numbers (n INTEGER);
         WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 1000)
         INSERT INTO numbers SELECT x FROM seq;",
    )?;
    let engine = EngineHandle::new(sqlite);

    {
        let mut cursor = engine.execute("SELECT n FROM numbers")?;
        assert_eq!(cursor.advance()?, Some(vec![EngineValue::Int64(1)]));
        // dropped with 999 rows left
    }

    let doc = materialize(&engine, &QueryRequest::new("SELECT count(*) AS c FROM numbers"), &SessionConfig::default())?;
    assert_eq!(doc.rows()[0].values, vec![Value::Int64(1000)]);
    Ok(())
}

#[test]
fn test_exhausted_cursor_keeps_returning_none() -> Result<()> {
    let engine = EngineHandle::new(SqliteEngine::open_in_memory()?);
    let mut cursor = engine.execute("SELECT 7 AS seven")?;

    assert_eq!(cursor.columns()?, vec![Column::new("seven", "")]);
    assert_eq!(cursor.advance()?, Some(vec![EngineValue::Int64(7)]));
    assert_eq!(cursor.advance()?, None);
    assert_eq!(cursor.advance()?, None);
    Ok(())
}

#[test]
fn test_concurrent_sessions_are_serialized() -> Result<()> {
    let (sqlite, _dir) = create_temp_sqlite()?;
    sqlite.execute_batch(
        "CREATE TABLE numbers (n INTEGER);
         WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 250)
         INSERT INTO numbers SELECT x FROM seq;",
    )?;
    let engine = EngineHandle::new(sqlite);

    let workers: Vec<_> = (1..=4)
        .map(|k| {
            let engine = engine.clone();
            thread::spawn(move || {
                let sql = format!("SELECT n FROM numbers WHERE n % {} = 0 ORDER BY n", k);
                materialize(&engine, &QueryRequest::new(sql), &SessionConfig::default())
            })
        })
        .collect();

    for (k, worker) in (1..=4).zip(workers) {
        let doc = worker.join().unwrap()?;
        assert_eq!(doc.row_count(), 250 / k);
        assert_eq!(doc.rows()[0].values, vec![Value::Int64(k as i64)]);
    }
    Ok(())
}

#[test]
fn test_in_memory_interval_free_values() -> Result<()> {
    // SQLite has no interval type; text in an INTERVAL column stays text
    let sqlite = SqliteEngine::open_in_memory()?;
    sqlite.execute_batch("CREATE TABLE t (span INTERVAL); INSERT INTO t VALUES ('5 days');")?;
    let engine = EngineHandle::new(sqlite);

    let doc = materialize(&engine, &QueryRequest::new("SELECT span FROM t"), &SessionConfig::default())?;
    assert_eq!(doc.rows()[0].values, vec![Value::string("5 days")]);
    assert_ne!(doc.rows()[0].values[0], Value::Interval(Interval::from_days(5)));
    Ok(())
}

#[test]
fn test_integer_epoch_cells_in_temporal_columns() -> Result<()> {
    let sqlite = SqliteEngine::open_in_memory()?;
    sqlite.execute_batch(
        "CREATE TABLE stamps (created TIMESTAMP, day DATE, at_time TIME);
         INSERT INTO stamps VALUES (716950923, 1698796800, 3723);",
    )?;
    let engine = EngineHandle::new(sqlite);

    let doc = materialize(&engine, &QueryRequest::new("SELECT * FROM stamps"), &SessionConfig::default())?;
    assert_eq!(
        doc.rows()[0].values,
        vec![
            Value::Timestamp(Timestamp::new(716_950_923, 0)),
            Value::Timestamp(Timestamp::new(SECOND_DAY_SECONDS, 0)),
            Value::Duration(Duration::from_millis(3_723_000)),
        ]
    );
    Ok(())
}

#[test]
fn test_cancelled_blocked_session_frees_connection() -> Result<()> {
    let (sqlite, _dir) = create_temp_sqlite()?;
    sqlite.execute_batch(
        "CREATE TABLE numbers (n INTEGER);
         WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 100)
         INSERT INTO numbers SELECT x FROM seq;",
    )?;
    let engine = EngineHandle::new(sqlite);

    let (mut sink, rx) = ChannelSink::bounded(0);
    let mut session = StreamingSession::new(engine.clone(), SessionConfig::default());
    let token = session.cancellation_token();
    let producer = thread::spawn(move || session.run(&QueryRequest::new("SELECT n FROM numbers"), &mut sink));

    assert!(matches!(rx.recv()?, QueryResponse::Header(_)));
    assert!(matches!(rx.recv()?, QueryResponse::Row(_)));
    // stop reading but keep the receiver open
    token.cancel();

    let err = producer.join().unwrap().unwrap_err();
    assert!(matches!(err, SessionError::Cancelled { .. }));
    assert_eq!(err.code(), StatusCode::Cancelled);

    // the cursor is gone, so the single connection serves the next query
    let doc = materialize(&engine, &QueryRequest::new("SELECT count(*) AS c FROM numbers"), &SessionConfig::default())?;
    assert_eq!(doc.rows()[0].values, vec![Value::Int64(100)]);
    drop(rx);
    Ok(())
}
