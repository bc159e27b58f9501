use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use log::info;

use rowwire::client::{format_row, FrameReader};
use rowwire::common::types::Interval;
use rowwire::engine::{EngineValue, ScriptedEngine, ScriptedResult};
use rowwire::{stream_to_writer, CodecConfig, Column, EngineHandle, QueryRequest, SessionConfig};

const DEMO_QUERY: &str = "SELECT * FROM demo";

fn demo_engine() -> Result<ScriptedEngine> {
    let columns = vec![
        Column::new("hello", "VARCHAR"),
        Column::new("a", "INTEGER"),
        Column::new("b", "DOUBLE"),
        Column::new("c", "BOOLEAN"),
        Column::new("d", "DATE"),
        Column::new("e", "TIME"),
        Column::new("f", "TIMESTAMP"),
        Column::new("g", "INTERVAL"),
        Column::new("h", "NULL"),
        Column::new("i", "BLOB"),
        Column::new("k", "INTEGER[]"),
        Column::new("l", "STRUCT(name VARCHAR, age INTEGER)"),
    ];

    let first_day = NaiveDate::from_ymd_opt(1992, 9, 20).context("invalid demo date")?;
    let second_day = NaiveDate::from_ymd_opt(2023, 11, 1).context("invalid demo date")?;
    let first_time = NaiveTime::from_hms_milli_opt(1, 2, 3, 456).context("invalid demo time")?;
    let second_time = NaiveTime::from_hms_milli_opt(14, 30, 45, 123).context("invalid demo time")?;
    let first_ts = first_day.and_hms_milli_opt(1, 2, 3, 789).context("invalid demo timestamp")?;
    let second_ts = second_day.and_hms_milli_opt(14, 30, 45, 123).context("invalid demo timestamp")?;

    let result = ScriptedResult::new(columns)
        .with_row(vec![
            EngineValue::text("world"),
            EngineValue::Int32(123),
            EngineValue::Float64(1.2),
            EngineValue::Boolean(true),
            EngineValue::Date(first_day),
            EngineValue::Time(first_time),
            EngineValue::Timestamp(first_ts),
            EngineValue::Interval(Interval::from_days(5)),
            EngineValue::Null,
            EngineValue::Bytes(b"some bytes".to_vec()),
            EngineValue::List(vec![EngineValue::Int32(1), EngineValue::Int32(2), EngineValue::Int32(3)]),
            EngineValue::map([("name", EngineValue::text("John")), ("age", EngineValue::Int32(25))]),
        ])
        .with_row(vec![
            EngineValue::text("world2"),
            EngineValue::Int32(124),
            EngineValue::Float64(1.3),
            EngineValue::Boolean(false),
            EngineValue::Date(second_day),
            EngineValue::Time(second_time),
            EngineValue::Timestamp(second_ts),
            EngineValue::Interval(Interval::from_months(2)),
            EngineValue::Null,
            EngineValue::Bytes(b"more bytes".to_vec()),
            EngineValue::List(vec![EngineValue::Int32(4), EngineValue::Int32(5)]),
            EngineValue::map([("name", EngineValue::text("Jane")), ("age", EngineValue::Int32(30))]),
        ]);

    Ok(ScriptedEngine::new().with_script(DEMO_QUERY, result))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let engine = EngineHandle::new(demo_engine()?);
    let codec_config = CodecConfig::default();

    // Stream into an in-memory buffer, then read it back as a client would
    let mut buffer = Vec::new();
    let summary = stream_to_writer(
        &engine,
        &QueryRequest::new(DEMO_QUERY),
        &SessionConfig::default(),
        &codec_config,
        &mut buffer,
    )?;
    info!("Streamed {} rows in {} bytes", summary.rows_sent, buffer.len());

    let outcome = FrameReader::new(buffer.as_slice(), codec_config)
        .read_to_end()
        .context("Failed to decode response stream")?;
    let header = outcome.header.context("Response stream carried no header")?;

    for row in &outcome.rows {
        println!("{}", format_row(&header.columns, row));
    }
    println!("Status: {}", outcome.status);

    Ok(())
}
