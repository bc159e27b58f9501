// Value Encoder
//
// Converts one engine value, plus the declared type of its column when there
// is one, into a wire `Value`. The declared type wins over the value's own
// shape, since the shape alone cannot tell a clock time from a timestamp or a
// date from a full instant. Nested values are encoded without a declared type.

use std::fmt;

use chrono::{NaiveTime, Timelike};
use thiserror::Error;

use crate::common::types::{ColumnIndex, RowIndex};
use crate::config::{SessionConfig, DEFAULT_MAX_NESTING_DEPTH};
use crate::engine::{EngineRow, EngineValue};
use crate::query::column::{normalize_type_name, Column};
use crate::wire::message::WireRow;
use crate::wire::value::{Duration, Timestamp, Value};

/// Declared types the encoder gives special treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// DATE and the full timestamp types: encoded as an absolute instant
    Timestamp,
    /// Clock time: encoded as elapsed time since midnight of its own day
    Time,
    Interval,
    Other,
}

impl TypeFamily {
    pub fn of(declared_type: &str) -> Self {
        match normalize_type_name(declared_type).as_str() {
            "DATE" | "DATETIME" | "TIMESTAMP" | "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE"
            | "TIMESTAMP WITHOUT TIME ZONE" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS" => {
                TypeFamily::Timestamp
            }
            "TIME" | "TIMETZ" | "TIME WITH TIME ZONE" | "TIME WITHOUT TIME ZONE" => TypeFamily::Time,
            "INTERVAL" => TypeFamily::Interval,
            _ => TypeFamily::Other,
        }
    }
}

/// One step into a nested value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Where in a result a failing value sits
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellPosition {
    pub row: Option<RowIndex>,
    pub column: Option<ColumnIndex>,
    /// Path from the cell down to the failing element, outermost first
    pub path: Vec<PathSegment>,
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(row) = self.row {
            parts.push(format!("row {}", row));
        }
        if let Some(column) = self.column {
            parts.push(format!("column {}", column));
        }
        if !self.path.is_empty() {
            let mut path = String::from("element ");
            for segment in &self.path {
                match segment {
                    PathSegment::Index(i) => path.push_str(&format!("[{}]", i)),
                    PathSegment::Key(k) => path.push_str(&format!(".{}", k)),
                }
            }
            parts.push(path);
        }
        if parts.is_empty() {
            write!(f, "top-level value")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeFailure {
    #[error("value nested deeper than {0} levels")]
    DepthExceeded(usize),
    #[error("row has {actual} values, but the result has {expected} columns")]
    RowWidth { expected: usize, actual: usize },
}

/// A cell that could not be encoded, with its position in the result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Encoding error at {position}: {failure}")]
pub struct EncodeError {
    pub position: CellPosition,
    pub failure: EncodeFailure,
}

impl EncodeError {
    fn new(failure: EncodeFailure) -> Self {
        Self {
            position: CellPosition::default(),
            failure,
        }
    }

    fn nested_in(mut self, segment: PathSegment) -> Self {
        self.position.path.insert(0, segment);
        self
    }

    fn at_cell(mut self, row: RowIndex, column: ColumnIndex) -> Self {
        self.position.row = Some(row);
        self.position.column = Some(column);
        self
    }
}

/// Result type for encoding
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Stateless converter from engine values to wire values
#[derive(Debug, Clone)]
pub struct ValueEncoder {
    max_depth: usize,
}

impl Default for ValueEncoder {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl ValueEncoder {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            max_depth: config.max_nesting_depth,
        }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Encode one value. `declared_type` is the engine type name of the
    /// column the value came from, if known.
    pub fn encode(&self, value: EngineValue, declared_type: Option<&str>) -> EncodeResult<Value> {
        self.encode_at(value, declared_type, 0)
    }

    /// Encode a whole row against its columns
    pub fn encode_row(&self, row_index: RowIndex, row: EngineRow, columns: &[Column]) -> EncodeResult<WireRow> {
        if row.len() != columns.len() {
            let mut err = EncodeError::new(EncodeFailure::RowWidth {
                expected: columns.len(),
                actual: row.len(),
            });
            err.position.row = Some(row_index);
            return Err(err);
        }

        let mut values = Vec::with_capacity(row.len());
        for (column_index, (value, column)) in row.into_iter().zip(columns).enumerate() {
            let encoded = self
                .encode(value, column.type_hint())
                .map_err(|e| e.at_cell(row_index, column_index))?;
            values.push(encoded);
        }
        Ok(WireRow { values })
    }

    fn encode_at(&self, value: EngineValue, declared_type: Option<&str>, depth: usize) -> EncodeResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let value = match declared_type.map(TypeFamily::of) {
            Some(family) if family != TypeFamily::Other => match encode_declared(value, family) {
                Ok(encoded) => return Ok(encoded),
                Err(unmatched) => unmatched,
            },
            _ => value,
        };

        self.sniff(value, depth)
    }

    fn sniff(&self, value: EngineValue, depth: usize) -> EncodeResult<Value> {
        match value {
            EngineValue::Map(entries) => {
                self.check_depth(depth)?;
                let mut out = linked_hash_map::LinkedHashMap::with_capacity(entries.len());
                for (key, item) in entries {
                    let encoded = self
                        .encode_at(item, None, depth + 1)
                        .map_err(|e| e.nested_in(PathSegment::Key(key.clone())))?;
                    out.insert(key, encoded);
                }
                Ok(Value::Map(out))
            }
            EngineValue::List(items) => {
                self.check_depth(depth)?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let encoded = self
                        .encode_at(item, None, depth + 1)
                        .map_err(|e| e.nested_in(PathSegment::Index(i)))?;
                    out.push(encoded);
                }
                Ok(Value::List(out))
            }
            EngineValue::Null => Ok(Value::Null),
            EngineValue::Int64(i) => Ok(Value::Int64(i)),
            EngineValue::Int32(i) => Ok(Value::Int64(i64::from(i))),
            EngineValue::Float64(f) => Ok(Value::Double(f)),
            EngineValue::Float32(f) => Ok(Value::Double(f64::from(f))),
            EngineValue::Boolean(b) => Ok(Value::Bool(b)),
            EngineValue::Text(s) => Ok(Value::String(s)),
            EngineValue::Bytes(b) => Ok(Value::Bytes(b)),
            // Lossy: a DECIMAL keeps only what fits in an f64
            EngineValue::Decimal(d) => Ok(Value::Double(d.to_f64())),
            other => Ok(Value::String(fallback_text(&other))),
        }
    }

    fn check_depth(&self, depth: usize) -> EncodeResult<()> {
        if depth >= self.max_depth {
            return Err(EncodeError::new(EncodeFailure::DepthExceeded(self.max_depth)));
        }
        Ok(())
    }
}

/// Apply the declared-type rule for `family`, or hand the value back when its
/// shape does not carry what the rule needs.
fn encode_declared(value: EngineValue, family: TypeFamily) -> Result<Value, EngineValue> {
    match (family, value) {
        (TypeFamily::Timestamp, EngineValue::Date(date)) => {
            Ok(Value::Timestamp(Timestamp::from_naive_utc(&date.and_time(NaiveTime::MIN))))
        }
        (TypeFamily::Timestamp, EngineValue::Timestamp(ts)) => Ok(Value::Timestamp(Timestamp::from_naive_utc(&ts))),
        (TypeFamily::Timestamp, EngineValue::TimestampTz(ts)) => Ok(Value::Timestamp(Timestamp::from_datetime(&ts))),
        (TypeFamily::Time, EngineValue::Time(time)) => Ok(Value::Duration(since_midnight(&time))),
        (TypeFamily::Time, EngineValue::Timestamp(ts)) => Ok(Value::Duration(since_midnight(&ts.time()))),
        // local wall-clock time of the instant, in its own offset
        (TypeFamily::Time, EngineValue::TimestampTz(ts)) => Ok(Value::Duration(since_midnight(&ts.time()))),
        (TypeFamily::Interval, EngineValue::Interval(interval)) => Ok(Value::Interval(interval)),
        (_, value) => Err(value),
    }
}

/// Time elapsed since midnight of the same day
fn since_midnight(time: &NaiveTime) -> Duration {
    let seconds = i64::from(time.num_seconds_from_midnight());
    Duration::from_nanos(seconds * 1_000_000_000 + i64::from(time.nanosecond()))
}

/// Display form used for values with no structured wire counterpart. Never
/// empty, so a consumer can always tell the fallback fired.
fn fallback_text(value: &EngineValue) -> String {
    let text = value.to_string();
    if !text.is_empty() {
        return text;
    }
    match value {
        EngineValue::Other { type_name, .. } if !type_name.is_empty() => format!("<{}>", type_name),
        _ => format!("<{}>", value.kind()),
    }
}

/// Encode with the default configuration
pub fn encode_value(value: EngineValue, declared_type: Option<&str>) -> EncodeResult<Value> {
    ValueEncoder::default().encode(value, declared_type)
}
