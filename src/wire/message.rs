// Protocol Messages
//
// A query exchange is one request followed by a stream of responses: exactly
// one header, then zero or more rows positionally aligned with the header.
// Framed transports close the stream with a trailer carrying the status.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::column::Column;
use crate::wire::value::Value;

/// Inbound request: free-form query text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

/// First response of a stream: the result's columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub columns: Vec<Column>,
}

/// One encoded result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRow {
    pub values: Vec<Value>,
}

impl WireRow {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryResponse {
    Header(Header),
    Row(WireRow),
}

/// Outcome classification carried at stream termination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    /// The request itself was unusable (client error)
    InvalidArgument,
    Cancelled,
    /// Engine, cursor or encoding failure
    Internal,
    /// The transport or the engine went away
    Unavailable,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Unit of the framed byte stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Response(QueryResponse),
    Trailer(Status),
}
