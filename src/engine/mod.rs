// Query Engine Boundary
//
// The query engine is an external collaborator: it parses, plans and executes
// SQL and hands back a live cursor. This module fixes the interface the rest
// of the crate consumes and provides the shared engine handle.

pub mod scripted;
pub mod sqlite;
pub mod value;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::query::column::Column;

pub use self::scripted::{ScriptedEngine, ScriptedResult};
pub use self::sqlite::SqliteEngine;
pub use self::value::{EngineRow, EngineValue};

/// Errors reported by an engine or one of its cursors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The query could not be started
    #[error("Execution error: {0}")]
    Execution(String),
    /// Column metadata could not be read from a fresh cursor
    #[error("Metadata error: {0}")]
    Metadata(String),
    /// The cursor failed while advancing
    #[error("Cursor error: {0}")]
    Cursor(String),
    /// The cursor produced a row that does not line up with the columns
    #[error("Row has {actual} values, but the result has {expected} columns")]
    RowWidth { expected: usize, actual: usize },
    /// The cursor already failed once and cannot be advanced again
    #[error("Cursor already failed")]
    CursorFailed,
    /// The engine itself is gone (worker stopped, connection closed)
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// A live, forward-only handle to one executing result set.
///
/// Dropping the cursor releases whatever the engine holds for it.
pub trait RowCursor: Send {
    /// Column metadata of the result, in positional order
    fn columns(&self) -> EngineResult<Vec<Column>>;

    /// Advance by one row. `Ok(None)` means the result set is exhausted.
    fn advance(&mut self) -> EngineResult<Option<EngineRow>>;
}

/// Entry point of a query engine. Implementations must tolerate concurrent
/// calls from several sessions, serializing internally if they have to.
pub trait QueryEngine: Send + Sync {
    fn execute(&self, sql: &str) -> EngineResult<Box<dyn RowCursor>>;
}

/// Shared handle to the one engine instance of a process.
///
/// Constructed once at startup and cloned into every session.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn QueryEngine>,
}

impl EngineHandle {
    pub fn new<E: QueryEngine + 'static>(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn from_arc(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    /// Submit query text to the engine
    pub fn execute(&self, sql: &str) -> EngineResult<Box<dyn RowCursor>> {
        self.engine.execute(sql)
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}
