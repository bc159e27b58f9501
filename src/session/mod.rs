// Streaming Session
//
// Drives one query end to end as a single server-streaming exchange:
// validate, execute, emit the header once, then pull/encode/send rows until
// the cursor is exhausted or something fails. One session runs as one
// sequential loop; concurrent queries get their own sessions.

pub mod bulk;
pub mod cancel;
pub mod error;
pub mod sink;

use std::fmt;
use std::io::Write;

use log::{debug, error, info, trace, warn};

use crate::config::{CodecConfig, SessionConfig};
use crate::engine::EngineHandle;
use crate::query::iterator::RowIterator;
use crate::wire::encoder::ValueEncoder;
use crate::wire::message::{Header, QueryRequest, QueryResponse, Status};

pub use self::bulk::{materialize, QueryDocument};
pub use self::cancel::CancellationToken;
pub use self::error::{SessionError, SessionResult, SinkError};
pub use self::sink::{ChannelSink, CollectingSink, FrameWriter, ResponseSink};

/// Lifecycle of a session: `Start -> Executing -> Streaming -> {Completed | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Start,
    Executing,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Start => "start",
            SessionState::Executing => "executing",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// What a completed session streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub columns: usize,
    pub rows_sent: usize,
}

/// One query execution streamed to one consumer. Not reusable: once `run`
/// has returned, `state()` reports how it ended and further runs are refused.
pub struct StreamingSession {
    engine: EngineHandle,
    config: SessionConfig,
    cancel: CancellationToken,
    state: SessionState,
    rows_sent: usize,
}

impl StreamingSession {
    pub fn new(engine: EngineHandle, config: SessionConfig) -> Self {
        Self {
            engine,
            config,
            cancel: CancellationToken::new(),
            state: SessionState::Start,
            rows_sent: 0,
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this session when triggered from elsewhere
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Execute `request` and stream its result into `sink`.
    ///
    /// On failure, rows already sent stand; nothing further is sent. The
    /// cursor is released on every exit path.
    pub fn run<S: ResponseSink + ?Sized>(&mut self, request: &QueryRequest, sink: &mut S) -> SessionResult<SessionSummary> {
        if self.state != SessionState::Start {
            return Err(SessionError::AlreadyRun(self.state));
        }

        match self.stream(request, sink) {
            Ok(summary) => {
                self.transition(SessionState::Completed);
                info!(
                    "Query completed: {} columns, {} rows streamed",
                    summary.columns, summary.rows_sent
                );
                Ok(summary)
            }
            Err(err) => {
                self.transition(SessionState::Failed);
                match &err {
                    SessionError::Cancelled { rows_sent } => {
                        warn!("Query cancelled after {} rows", rows_sent)
                    }
                    SessionError::InvalidQuery(reason) => debug!("Rejected query: {}", reason),
                    other => error!("Query failed ({}): {}", other.code(), other),
                }
                Err(err)
            }
        }
    }

    fn stream<S: ResponseSink + ?Sized>(&mut self, request: &QueryRequest, sink: &mut S) -> SessionResult<SessionSummary> {
        if request.sql.trim().is_empty() {
            return Err(SessionError::InvalidQuery("sql string is empty".to_string()));
        }
        self.check_cancelled()?;

        self.transition(SessionState::Executing);
        debug!("Executing query: {}", request.sql.trim());
        let cursor = self.engine.execute(&request.sql).map_err(SessionError::Execution)?;
        let mut rows = RowIterator::new(cursor).map_err(SessionError::Execution)?;

        self.transition(SessionState::Streaming);
        let columns = rows.columns().to_vec();
        self.check_cancelled()?;
        self.send(
            sink,
            QueryResponse::Header(Header {
                columns: columns.clone(),
            }),
        )?;
        debug!("Header sent with {} columns", columns.len());

        let encoder = ValueEncoder::new(&self.config);
        loop {
            self.check_cancelled()?;
            let row = match rows.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(source) => {
                    return Err(SessionError::Cursor {
                        rows_sent: self.rows_sent,
                        source,
                    });
                }
            };

            let encoded = encoder.encode_row(self.rows_sent, row, &columns)?;
            self.check_cancelled()?;
            self.send(sink, QueryResponse::Row(encoded))?;
            self.rows_sent += 1;

            if self.config.log_rows {
                trace!("Row {} sent", self.rows_sent - 1);
            }
        }

        Ok(SessionSummary {
            columns: columns.len(),
            rows_sent: self.rows_sent,
        })
    }

    /// Hand one response to the sink. A send that fails because the session
    /// was cancelled meanwhile counts as cancellation, not a transport error.
    fn send<S: ResponseSink + ?Sized>(&self, sink: &mut S, response: QueryResponse) -> SessionResult<()> {
        match sink.send_or_cancel(response, &self.cancel) {
            Ok(()) => Ok(()),
            Err(SinkError::Cancelled) => Err(self.cancelled()),
            Err(_) if self.cancel.is_cancelled() => Err(self.cancelled()),
            Err(e) => Err(SessionError::Transport(e)),
        }
    }

    fn cancelled(&self) -> SessionError {
        SessionError::Cancelled {
            rows_sent: self.rows_sent,
        }
    }

    fn check_cancelled(&self) -> SessionResult<()> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        trace!("Session {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Run one session and write it to `writer` as a framed stream, closing the
/// stream with a trailer that carries the outcome.
pub fn stream_to_writer<W: Write>(
    engine: &EngineHandle,
    request: &QueryRequest,
    session_config: &SessionConfig,
    codec_config: &CodecConfig,
    writer: W,
) -> SessionResult<SessionSummary> {
    let mut frames = FrameWriter::new(writer, codec_config.clone());
    let result = StreamingSession::new(engine.clone(), session_config.clone()).run(request, &mut frames);

    let status = match &result {
        Ok(_) => Status::ok(),
        Err(err) => err.status(),
    };
    if let Err(e) = frames.write_trailer(status) {
        // a failed transport cannot carry its own trailer
        return match result {
            Ok(_) => Err(SessionError::Transport(SinkError::from(e))),
            Err(err) => Err(err),
        };
    }
    result
}
