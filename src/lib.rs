// rowwire: type-preserving row streaming for query results

pub mod client;
pub mod common;
pub mod config;
pub mod engine;
pub mod query;
pub mod session;
pub mod wire;

// Re-export key items for convenient access
pub use config::{CodecConfig, SessionConfig, SqliteConfig};
pub use engine::{EngineError, EngineHandle, EngineValue, QueryEngine, RowCursor};
pub use query::{Column, RowIterator};
pub use session::{materialize, stream_to_writer, SessionError, SessionState, StreamingSession};
pub use wire::{QueryRequest, QueryResponse, Value, ValueEncoder};
