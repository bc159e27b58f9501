use thiserror::Error;

use crate::engine::EngineError;
use crate::session::SessionState;
use crate::wire::encoder::EncodeError;
use crate::wire::message::{Status, StatusCode};

/// Transport-side failures of a response sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Consumer disconnected")]
    Disconnected,
    #[error("Transport error: {0}")]
    Transport(String),
    /// The session was cancelled while waiting on the consumer
    #[error("Send abandoned after cancellation")]
    Cancelled,
}

impl From<crate::wire::codec::CodecError> for SinkError {
    fn from(err: crate::wire::codec::CodecError) -> Self {
        SinkError::Transport(err.to_string())
    }
}

/// Every way a streaming session can end other than completion
#[derive(Error, Debug)]
pub enum SessionError {
    /// Rejected before touching the engine
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The engine could not start the query; nothing was streamed
    #[error("Failed to execute query: {0}")]
    Execution(#[source] EngineError),
    /// The cursor failed after `rows_sent` rows had been emitted
    #[error("Query failed after {rows_sent} rows: {source}")]
    Cursor {
        rows_sent: usize,
        #[source]
        source: EngineError,
    },
    #[error("{0}")]
    Encode(#[from] EncodeError),
    #[error("Failed to send response: {0}")]
    Transport(#[from] SinkError),
    #[error("Session cancelled after {rows_sent} rows")]
    Cancelled { rows_sent: usize },
    /// `run` called on a session that already ran
    #[error("Session already {0}")]
    AlreadyRun(SessionState),
}

impl SessionError {
    pub fn code(&self) -> StatusCode {
        match self {
            SessionError::InvalidQuery(_) | SessionError::AlreadyRun(_) => StatusCode::InvalidArgument,
            SessionError::Execution(EngineError::Unavailable(_)) => StatusCode::Unavailable,
            SessionError::Execution(_) => StatusCode::Internal,
            SessionError::Cursor { .. } => StatusCode::Internal,
            SessionError::Encode(_) => StatusCode::Internal,
            SessionError::Transport(_) => StatusCode::Unavailable,
            SessionError::Cancelled { .. } => StatusCode::Cancelled,
        }
    }

    /// Status reported to the consumer at stream termination
    pub fn status(&self) -> Status {
        Status::new(self.code(), self.to_string())
    }

    /// Whether the failure happened before any message could be emitted
    pub fn before_header(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidQuery(_) | SessionError::Execution(_) | SessionError::AlreadyRun(_)
        )
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
