// Wire Format Module
//
// Tagged wire values, the encoder that produces them, protocol messages and
// the frame codec.

pub mod codec;
pub mod encoder;
pub mod message;
pub mod value;

pub use self::codec::CodecError;
pub use self::encoder::{EncodeError, ValueEncoder};
pub use self::message::{Frame, Header, QueryRequest, QueryResponse, Status, StatusCode, WireRow};
pub use self::value::{Duration, Interval, Timestamp, Value};
