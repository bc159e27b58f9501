// Configuration
//
// Tunables for sessions, the frame codec and the SQLite engine adapter.

use std::path::PathBuf;
use std::time::Duration;

/// Default bound on how deeply nested lists/maps may be encoded
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Default upper bound on a single encoded frame (16 MiB)
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Configuration for streaming sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum container nesting the encoder accepts before failing the cell
    pub max_nesting_depth: usize,

    /// Emit a trace line for every row sent
    pub log_rows: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            log_rows: false,
        }
    }
}

/// Configuration for the length-prefixed frame codec
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Largest payload accepted on write and on read
    pub max_frame_len: u32,

    /// Deepest list/map nesting accepted when decoding a frame
    pub max_nesting_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

/// Configuration for the embedded SQLite engine
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file; `None` opens a private in-memory database
    pub path: Option<PathBuf>,

    /// How long a statement waits on a locked database file
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}
