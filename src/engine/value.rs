// Engine Value Model
//
// Opaque runtime values as handed over by a query engine, before any wire
// encoding. The set of shapes is closed; anything an engine cannot express
// with the structured variants travels as `Other`.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use linked_hash_map::LinkedHashMap;

use crate::common::types::{Decimal, Interval};

/// One cell value produced by an engine cursor
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    HugeInt(i128),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Wall-clock timestamp without zone, read as UTC
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Interval(Interval),
    Uuid(u128),
    List(Vec<EngineValue>),
    /// String-keyed composite (struct or map), entries in engine order
    Map(LinkedHashMap<String, EngineValue>),
    /// Engine-specific value with no structured counterpart
    Other { type_name: String, text: String },
}

/// A row exactly as the cursor produced it, positionally aligned with the
/// result's columns
pub type EngineRow = Vec<EngineValue>;

impl EngineValue {
    pub fn is_null(&self) -> bool {
        matches!(self, EngineValue::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        EngineValue::Text(s.into())
    }

    /// Build a map value from `(key, value)` pairs, keeping their order
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, EngineValue)>,
    {
        let mut map = LinkedHashMap::new();
        for (key, value) in entries {
            map.insert(key.into(), value);
        }
        EngineValue::Map(map)
    }

    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            EngineValue::Null => "NULL",
            EngineValue::Boolean(_) => "BOOLEAN",
            EngineValue::Int32(_) => "INTEGER",
            EngineValue::Int64(_) => "BIGINT",
            EngineValue::UInt64(_) => "UBIGINT",
            EngineValue::HugeInt(_) => "HUGEINT",
            EngineValue::Float32(_) => "FLOAT",
            EngineValue::Float64(_) => "DOUBLE",
            EngineValue::Decimal(_) => "DECIMAL",
            EngineValue::Text(_) => "VARCHAR",
            EngineValue::Bytes(_) => "BLOB",
            EngineValue::Date(_) => "DATE",
            EngineValue::Time(_) => "TIME",
            EngineValue::Timestamp(_) => "TIMESTAMP",
            EngineValue::TimestampTz(_) => "TIMESTAMPTZ",
            EngineValue::Interval(_) => "INTERVAL",
            EngineValue::Uuid(_) => "UUID",
            EngineValue::List(_) => "LIST",
            EngineValue::Map(_) => "MAP",
            EngineValue::Other { .. } => "OTHER",
        }
    }
}

fn format_uuid(value: u128) -> String {
    let hex = format!("{:032x}", value);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

impl fmt::Display for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineValue::Null => write!(f, "NULL"),
            EngineValue::Boolean(b) => write!(f, "{}", b),
            EngineValue::Int32(i) => write!(f, "{}", i),
            EngineValue::Int64(i) => write!(f, "{}", i),
            EngineValue::UInt64(u) => write!(f, "{}", u),
            EngineValue::HugeInt(i) => write!(f, "{}", i),
            EngineValue::Float32(fl) => write!(f, "{}", fl),
            EngineValue::Float64(fl) => write!(f, "{}", fl),
            EngineValue::Decimal(d) => write!(f, "{}", d),
            EngineValue::Text(s) => write!(f, "{}", s),
            EngineValue::Bytes(b) => write!(f, "\\x{}", hex::encode(b)),
            EngineValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EngineValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            EngineValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            EngineValue::TimestampTz(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f%:z")),
            EngineValue::Interval(i) => write!(f, "{}", i),
            EngineValue::Uuid(u) => write!(f, "{}", format_uuid(*u)),
            EngineValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            EngineValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            EngineValue::Other { text, .. } => write!(f, "{}", text),
        }
    }
}
