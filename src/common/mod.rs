// Shared Types Module
//
// Value-level types used by both the engine boundary and the wire format.

pub mod types;

pub use self::types::{Decimal, Interval};
