// Frame Reader
//
// Decodes a framed response stream and checks the protocol contract as it
// goes: header at most once and before any row, every row as wide as the
// header, exactly one trailer at the end.

use std::io::Read;

use thiserror::Error;

use crate::config::CodecConfig;
use crate::wire::codec::{self, CodecError};
use crate::wire::message::{Frame, Header, QueryResponse, Status, WireRow};

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Row received before the header")]
    RowBeforeHeader,
    #[error("Header received more than once")]
    DuplicateHeader,
    #[error("Row {index} has {actual} values, but the header has {expected} columns")]
    RowWidth { index: usize, expected: usize, actual: usize },
    #[error("Frame received after the trailer")]
    FrameAfterTrailer,
    #[error("Stream ended without a trailer")]
    MissingTrailer,
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Header(Header),
    Row(WireRow),
    /// Stream termination, successful or not
    End(Status),
}

/// Everything a stream delivered. `header` is `None` when the query failed
/// before producing a result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub header: Option<Header>,
    pub rows: Vec<WireRow>,
    pub status: Status,
}

pub struct FrameReader<R: Read> {
    reader: R,
    config: CodecConfig,
    width: Option<usize>,
    rows_read: usize,
    ended: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R, config: CodecConfig) -> Self {
        Self {
            reader,
            config,
            width: None,
            rows_read: 0,
            ended: false,
        }
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Next event, or `Ok(None)` once the stream is closed after its trailer
    pub fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        let frame = codec::read_frame(&mut self.reader, &self.config)?;
        match (frame, self.ended) {
            (None, true) => Ok(None),
            (None, false) => Err(ProtocolError::MissingTrailer),
            (Some(_), true) => Err(ProtocolError::FrameAfterTrailer),
            (Some(Frame::Trailer(status)), false) => {
                self.ended = true;
                Ok(Some(StreamEvent::End(status)))
            }
            (Some(Frame::Response(QueryResponse::Header(header))), false) => {
                if self.width.is_some() {
                    return Err(ProtocolError::DuplicateHeader);
                }
                self.width = Some(header.columns.len());
                Ok(Some(StreamEvent::Header(header)))
            }
            (Some(Frame::Response(QueryResponse::Row(row))), false) => {
                let expected = self.width.ok_or(ProtocolError::RowBeforeHeader)?;
                if row.len() != expected {
                    return Err(ProtocolError::RowWidth {
                        index: self.rows_read,
                        expected,
                        actual: row.len(),
                    });
                }
                self.rows_read += 1;
                Ok(Some(StreamEvent::Row(row)))
            }
        }
    }

    /// Read the whole stream, up to and including its trailer
    pub fn read_to_end(mut self) -> Result<QueryOutcome> {
        let mut header = None;
        let mut rows = Vec::new();
        loop {
            match self.next_event()? {
                Some(StreamEvent::Header(h)) => header = Some(h),
                Some(StreamEvent::Row(row)) => rows.push(row),
                Some(StreamEvent::End(status)) => {
                    // nothing may follow the trailer
                    if self.next_event()?.is_some() {
                        return Err(ProtocolError::FrameAfterTrailer);
                    }
                    return Ok(QueryOutcome { header, rows, status });
                }
                None => return Err(ProtocolError::MissingTrailer),
            }
        }
    }
}
