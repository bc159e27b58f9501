// Value Rendering
//
// Human-readable display of wire values. The column's declared type picks the
// display form of timestamps; nested values are rendered without one.

use chrono::SecondsFormat;

use crate::query::column::{normalize_type_name, Column};
use crate::wire::message::WireRow;
use crate::wire::value::{Duration, Timestamp, Value};

/// Render one value for display
pub fn format_value(value: &Value, declared_type: &str) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Double(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Bytes(b) => hex::encode(b),
        Value::Timestamp(ts) => format_timestamp(ts, declared_type),
        Value::Duration(d) => format_duration(d),
        Value::Interval(i) => format!("months:{}, days:{}, micros:{}", i.months, i.days, i.micros),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(|item| format_value(item, "")).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Map(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(key, item)| format!("{}: {}", key, format_value(item, "")))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn format_timestamp(ts: &Timestamp, declared_type: &str) -> String {
    let Some(dt) = ts.to_datetime() else {
        return format!("{}s+{}ns", ts.seconds, ts.nanos);
    };
    match normalize_type_name(declared_type).as_str() {
        "DATE" => dt.format("%Y-%m-%d").to_string(),
        "TIMESTAMP" | "DATETIME" => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        _ => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}

/// `hh:mm:ss.SSS`, hours unbounded
fn format_duration(d: &Duration) -> String {
    let sign = if d.nanos < 0 { "-" } else { "" };
    let total_millis = (d.nanos / 1_000_000).unsigned_abs();
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let seconds = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{}{:02}:{:02}:{:02}.{:03}", sign, hours, minutes, seconds, millis)
}

/// Render a row as `{ name(TYPE): value, ... }`
pub fn format_row(columns: &[Column], row: &WireRow) -> String {
    let parts: Vec<String> = columns
        .iter()
        .zip(&row.values)
        .map(|(column, value)| {
            format!(
                "{}({}): {}",
                column.name(),
                column.declared_type(),
                format_value(value, column.declared_type())
            )
        })
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

/// Render a result as a plain text table
pub fn format_table(columns: &[Column], rows: &[WireRow]) -> String {
    if columns.is_empty() {
        return "Empty result".to_string();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(&row.values)
                .map(|(column, value)| format_value(value, column.declared_type()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cells
                .iter()
                .filter_map(|row| row.get(i).map(|cell| cell.chars().count()))
                .chain(std::iter::once(column.name().chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut result = String::new();
    result.push('|');
    for (column, width) in columns.iter().zip(&widths) {
        result.push_str(&format!(" {:<width$} |", column.name(), width = width));
    }
    result.push('\n');

    result.push('|');
    for width in &widths {
        result.push_str(&format!("{}|", "-".repeat(width + 2)));
    }
    result.push('\n');

    for row in &cells {
        result.push('|');
        for (cell, width) in row.iter().zip(&widths) {
            result.push_str(&format!(" {:<width$} |", cell, width = width));
        }
        result.push('\n');
    }

    result.push_str(&format!("({} rows)", rows.len()));
    result
}
