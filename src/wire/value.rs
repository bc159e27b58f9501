// Wire Value Types
//
// The self-describing tagged union every result cell travels as. A consumer
// can interpret a row without consulting column metadata.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};

pub use crate::common::types::Interval;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Absolute instant: seconds since the Unix epoch plus a sub-second part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Read a zone-less timestamp as UTC
    pub fn from_naive_utc(ts: &NaiveDateTime) -> Self {
        Self::from_datetime(&ts.and_utc())
    }

    pub fn from_datetime<Tz: TimeZone>(ts: &DateTime<Tz>) -> Self {
        Self {
            seconds: ts.timestamp(),
            nanos: ts.timestamp_subsec_nanos(),
        }
    }

    /// `None` when the instant is outside chrono's representable range
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

/// Elapsed time in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duration {
    pub nanos: i64,
}

impl Duration {
    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    pub fn whole_seconds(&self) -> i64 {
        self.nanos / NANOS_PER_SECOND
    }

    pub fn subsec_nanos(&self) -> i64 {
        self.nanos % NANOS_PER_SECOND
    }
}

/// One encoded cell. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int64(i64),
    Double(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
    Duration(Duration),
    Interval(Interval),
    List(#[serde(deserialize_with = "nesting::deserialize")] Vec<Value>),
    Map(#[serde(deserialize_with = "nesting::deserialize")] LinkedHashMap<String, Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut map = LinkedHashMap::new();
        for (key, value) in entries {
            map.insert(key.into(), value);
        }
        Value::Map(map)
    }

    /// Name of the populated variant
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int64(_) => "int64",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Duration(_) => "duration",
            Value::Interval(_) => "interval",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Container nesting bound applied while decoding values, so a hostile
/// stream cannot exhaust the reader's stack. Only enforced inside
/// `with_limit`, on the calling thread.
pub(crate) mod nesting {
    use std::cell::Cell;

    use serde::de::{Deserialize, Deserializer, Error};

    thread_local! {
        static LIMIT: Cell<Option<usize>> = Cell::new(None);
        static DEPTH: Cell<usize> = Cell::new(0);
    }

    /// Run `f` with at most `limit` nested lists/maps accepted
    pub(crate) fn with_limit<T>(limit: usize, f: impl FnOnce() -> T) -> T {
        let _scope = Scope {
            limit: LIMIT.with(|l| l.replace(Some(limit))),
            depth: DEPTH.with(|d| d.replace(0)),
        };
        f()
    }

    pub(crate) fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        let _level = Level::enter()
            .map_err(|limit| D::Error::custom(format!("value nested deeper than {} levels", limit)))?;
        T::deserialize(deserializer)
    }

    // restores the enclosing limit, also on unwind
    struct Scope {
        limit: Option<usize>,
        depth: usize,
    }

    impl Drop for Scope {
        fn drop(&mut self) {
            LIMIT.with(|l| l.set(self.limit));
            DEPTH.with(|d| d.set(self.depth));
        }
    }

    struct Level;

    impl Level {
        fn enter() -> Result<Self, usize> {
            let depth = DEPTH.with(|d| {
                d.set(d.get() + 1);
                d.get()
            });
            let level = Level;
            match LIMIT.with(Cell::get) {
                Some(limit) if depth > limit => Err(limit),
                _ => Ok(level),
            }
        }
    }

    impl Drop for Level {
        fn drop(&mut self) {
            DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
        }
    }
}
