// Frame Codec
//
// Each frame is a little-endian u32 payload length followed by the bincode
// encoding of one `Frame`.

use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::config::CodecConfig;
use crate::wire::message::Frame;
use crate::wire::value::nesting;

/// Size of the length prefix in bytes
pub const FRAME_HEADER_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to serialize frame: {0}")]
    Serialization(String),
    #[error("Failed to deserialize frame: {0}")]
    Deserialization(String),
    #[error("Frame of {len} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { len: u64, limit: u32 },
    #[error("Stream ended in the middle of a frame")]
    Truncated,
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Serialize a frame into a length-prefixed buffer
pub fn encode_frame(frame: &Frame, config: &CodecConfig) -> Result<Vec<u8>> {
    let payload = bincode::serialize(frame).map_err(|e| CodecError::Serialization(e.to_string()))?;
    if payload.len() as u64 > u64::from(config.max_frame_len) {
        return Err(CodecError::FrameTooLarge {
            len: payload.len() as u64,
            limit: config.max_frame_len,
        });
    }

    let mut buf = vec![0u8; FRAME_HEADER_LEN + payload.len()];
    LittleEndian::write_u32(&mut buf[..FRAME_HEADER_LEN], payload.len() as u32);
    buf[FRAME_HEADER_LEN..].copy_from_slice(&payload);
    Ok(buf)
}

/// Write one frame and flush, so the peer sees it without waiting for more
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, frame: &Frame, config: &CodecConfig) -> Result<usize> {
    let buf = encode_frame(frame, config)?;
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(buf.len())
}

/// Read one frame. `Ok(None)` means the stream ended cleanly on a frame
/// boundary. Values nested deeper than `config.max_nesting_depth` are a
/// deserialization error.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R, config: &CodecConfig) -> Result<Option<Frame>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(CodecError::Truncated),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let len = LittleEndian::read_u32(&header);
    if len > config.max_frame_len {
        return Err(CodecError::FrameTooLarge {
            len: u64::from(len),
            limit: config.max_frame_len,
        });
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CodecError::Truncated,
        _ => CodecError::Io(e),
    })?;

    nesting::with_limit(config.max_nesting_depth, || bincode::deserialize(&payload))
        .map(Some)
        .map_err(|e| CodecError::Deserialization(e.to_string()))
}
