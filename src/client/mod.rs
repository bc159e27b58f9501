// Client Module
//
// Consumer side of the framed protocol: decoding and validating a response
// stream, and rendering wire values for display.

pub mod reader;
pub mod render;

pub use self::reader::{FrameReader, ProtocolError, QueryOutcome, StreamEvent};
pub use self::render::{format_row, format_table, format_value};
