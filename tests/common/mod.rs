#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;

use rowwire::common::types::Interval;
use rowwire::engine::{EngineValue, ScriptedEngine, ScriptedResult, SqliteEngine};
use rowwire::wire::{Duration, Timestamp, Value};
use rowwire::{Column, EngineHandle, SqliteConfig};

pub const EXAMPLE_QUERY: &str = "SELECT hello, d, e, g FROM example";

// 1992-09-20T00:00:00Z and 2023-11-01T00:00:00Z
pub const FIRST_DAY_SECONDS: i64 = 716_947_200;
pub const SECOND_DAY_SECONDS: i64 = 1_698_796_800;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time_ms(h: u32, m: u32, s: u32, ms: u32) -> NaiveTime {
    NaiveTime::from_hms_milli_opt(h, m, s, ms).unwrap()
}

pub fn example_columns() -> Vec<Column> {
    vec![
        Column::new("hello", "TEXT"),
        Column::new("d", "DATE"),
        Column::new("e", "TIME"),
        Column::new("g", "INTERVAL"),
    ]
}

/// The two-row result of the reference query, as the engine hands it over
pub fn example_result() -> ScriptedResult {
    ScriptedResult::new(example_columns())
        .with_row(vec![
            EngineValue::text("world"),
            EngineValue::Date(date(1992, 9, 20)),
            EngineValue::Time(time_ms(1, 2, 3, 456)),
            EngineValue::Interval(Interval::from_days(5)),
        ])
        .with_row(vec![
            EngineValue::text("world2"),
            EngineValue::Date(date(2023, 11, 1)),
            EngineValue::Time(time_ms(14, 30, 45, 123)),
            EngineValue::Interval(Interval::from_months(2)),
        ])
}

/// The wire rows the reference query must stream
pub fn example_wire_rows() -> Vec<Vec<Value>> {
    vec![
        vec![
            Value::string("world"),
            Value::Timestamp(Timestamp::new(FIRST_DAY_SECONDS, 0)),
            Value::Duration(Duration::from_millis(3_723_456)),
            Value::Interval(Interval::new(0, 5, 0)),
        ],
        vec![
            Value::string("world2"),
            Value::Timestamp(Timestamp::new(SECOND_DAY_SECONDS, 0)),
            Value::Duration(Duration::from_millis(52_245_123)),
            Value::Interval(Interval::new(2, 0, 0)),
        ],
    ]
}

/// A single-BIGINT-column result of `count` rows numbered from zero
pub fn counting_result(count: usize) -> ScriptedResult {
    ScriptedResult::new(vec![Column::new("n", "BIGINT")])
        .with_generated_rows(count, |i| vec![EngineValue::Int64(i as i64)])
}

/// Scripted engine preloaded with the reference query, plus a handle to it
pub fn example_engine() -> (EngineHandle, Arc<ScriptedEngine>) {
    scripted_handle(ScriptedEngine::new().with_script(EXAMPLE_QUERY, example_result()))
}

pub fn scripted_handle(engine: ScriptedEngine) -> (EngineHandle, Arc<ScriptedEngine>) {
    let engine = Arc::new(engine);
    (EngineHandle::from_arc(engine.clone()), engine)
}

// Create a file-backed SQLite engine in a temporary directory
pub fn create_temp_sqlite() -> Result<(SqliteEngine, TempDir)> {
    let dir = tempfile::tempdir()?;
    let config = SqliteConfig::with_path(dir.path().join("test.db"));
    let engine = SqliteEngine::open(&config)?;
    Ok((engine, dir))
}
