// Response Sinks
//
// A sink is the transport-facing consumer of a session's responses. `send`
// blocks as long as the consumer is not ready, which is what backpressures the
// pulling of further rows from the engine.

use std::io::Write;

use crossbeam::channel::{bounded, select, Receiver, Sender};

use crate::config::CodecConfig;
use crate::session::cancel::CancellationToken;
use crate::session::error::SinkError;
use crate::wire::codec::{self, CodecError};
use crate::wire::message::{Frame, Header, QueryResponse, Status, WireRow};

pub trait ResponseSink {
    fn send(&mut self, response: QueryResponse) -> Result<(), SinkError>;

    /// Like `send`, but gives up with `SinkError::Cancelled` when `cancel`
    /// fires while the consumer is not ready. Sinks that never block can
    /// keep the default.
    fn send_or_cancel(&mut self, response: QueryResponse, cancel: &CancellationToken) -> Result<(), SinkError> {
        let _ = cancel;
        self.send(response)
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn send(&mut self, response: QueryResponse) -> Result<(), SinkError> {
        (**self).send(response)
    }

    fn send_or_cancel(&mut self, response: QueryResponse, cancel: &CancellationToken) -> Result<(), SinkError> {
        (**self).send_or_cancel(response, cancel)
    }
}

/// Keeps every response in memory, in order
#[derive(Debug, Default)]
pub struct CollectingSink {
    responses: Vec<QueryResponse>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(&self) -> &[QueryResponse] {
        &self.responses
    }

    pub fn into_responses(self) -> Vec<QueryResponse> {
        self.responses
    }

    pub fn header(&self) -> Option<&Header> {
        self.responses.iter().find_map(|r| match r {
            QueryResponse::Header(header) => Some(header),
            QueryResponse::Row(_) => None,
        })
    }

    pub fn rows(&self) -> Vec<&WireRow> {
        self.responses
            .iter()
            .filter_map(|r| match r {
                QueryResponse::Row(row) => Some(row),
                QueryResponse::Header(_) => None,
            })
            .collect()
    }
}

impl ResponseSink for CollectingSink {
    fn send(&mut self, response: QueryResponse) -> Result<(), SinkError> {
        self.responses.push(response);
        Ok(())
    }
}

/// Hands responses to another thread over a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<QueryResponse>,
}

impl ChannelSink {
    /// Create a sink and its receiving end. `capacity` responses may be queued
    /// before `send` blocks; zero makes every send a rendezvous.
    pub fn bounded(capacity: usize) -> (Self, Receiver<QueryResponse>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl ResponseSink for ChannelSink {
    fn send(&mut self, response: QueryResponse) -> Result<(), SinkError> {
        self.tx.send(response).map_err(|_| SinkError::Disconnected)
    }

    fn send_or_cancel(&mut self, response: QueryResponse, cancel: &CancellationToken) -> Result<(), SinkError> {
        select! {
            send(self.tx, response) -> sent => sent.map_err(|_| SinkError::Disconnected),
            recv(cancel.signal()) -> _ => Err(SinkError::Cancelled),
        }
    }
}

/// Writes responses as length-prefixed frames to a byte stream
#[derive(Debug)]
pub struct FrameWriter<W: Write> {
    writer: W,
    config: CodecConfig,
    frames_written: usize,
    bytes_written: usize,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W, config: CodecConfig) -> Self {
        Self {
            writer,
            config,
            frames_written: 0,
            bytes_written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Write the trailer that terminates the stream
    pub fn write_trailer(&mut self, status: Status) -> Result<(), CodecError> {
        self.write(&Frame::Trailer(status))
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, frame: &Frame) -> Result<(), CodecError> {
        let n = codec::write_frame(&mut self.writer, frame, &self.config)?;
        self.frames_written += 1;
        self.bytes_written += n;
        Ok(())
    }
}

impl<W: Write> ResponseSink for FrameWriter<W> {
    fn send(&mut self, response: QueryResponse) -> Result<(), SinkError> {
        self.write(&Frame::Response(response)).map_err(|e| match e {
            CodecError::Io(io) if io.kind() == std::io::ErrorKind::BrokenPipe => SinkError::Disconnected,
            other => SinkError::from(other),
        })
    }
}
