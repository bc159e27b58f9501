// Scripted Query Engine
//
// An in-process engine that replays registered results instead of running
// SQL. Each registered script can also fail at execution time, at metadata
// retrieval, or after a given number of rows.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::engine::{EngineError, EngineResult, EngineRow, QueryEngine, RowCursor};
use crate::query::column::Column;

type RowGenerator = Arc<dyn Fn(usize) -> EngineRow + Send + Sync>;

#[derive(Clone)]
enum RowSource {
    Fixed(Vec<EngineRow>),
    Generated { count: usize, generator: RowGenerator },
}

impl RowSource {
    fn len(&self) -> usize {
        match self {
            RowSource::Fixed(rows) => rows.len(),
            RowSource::Generated { count, .. } => *count,
        }
    }

    fn row(&self, index: usize) -> Option<EngineRow> {
        match self {
            RowSource::Fixed(rows) => rows.get(index).cloned(),
            RowSource::Generated { count, generator } => {
                (index < *count).then(|| generator(index))
            }
        }
    }
}

/// The result a scripted query replays
#[derive(Clone)]
pub struct ScriptedResult {
    columns: Vec<Column>,
    rows: RowSource,
    execution_error: Option<String>,
    metadata_error: Option<String>,
    fail_after: Option<(usize, String)>,
}

impl ScriptedResult {
    /// Create an empty result with the given columns
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: RowSource::Fixed(Vec::new()),
            execution_error: None,
            metadata_error: None,
            fail_after: None,
        }
    }

    pub fn with_row(mut self, row: EngineRow) -> Self {
        match &mut self.rows {
            RowSource::Fixed(rows) => rows.push(row),
            RowSource::Generated { .. } => self.rows = RowSource::Fixed(vec![row]),
        }
        self
    }

    pub fn with_rows(mut self, rows: Vec<EngineRow>) -> Self {
        self.rows = RowSource::Fixed(rows);
        self
    }

    /// Produce `count` rows lazily; row `i` is built on demand by `generator(i)`
    pub fn with_generated_rows<F>(mut self, count: usize, generator: F) -> Self
    where
        F: Fn(usize) -> EngineRow + Send + Sync + 'static,
    {
        self.rows = RowSource::Generated {
            count,
            generator: Arc::new(generator),
        };
        self
    }

    /// The query fails before producing a cursor
    pub fn fail_execution(mut self, message: impl Into<String>) -> Self {
        self.execution_error = Some(message.into());
        self
    }

    /// The cursor is produced but its column metadata cannot be read
    pub fn fail_metadata(mut self, message: impl Into<String>) -> Self {
        self.metadata_error = Some(message.into());
        self
    }

    /// The cursor fails when asked for row `rows` (after yielding `rows` rows)
    pub fn fail_after(mut self, rows: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((rows, message.into()));
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Debug for ScriptedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedResult")
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .field("execution_error", &self.execution_error)
            .field("metadata_error", &self.metadata_error)
            .field("fail_after", &self.fail_after)
            .finish()
    }
}

#[derive(Debug, Default)]
struct EngineStats {
    open_cursors: AtomicUsize,
    rows_pulled: AtomicUsize,
    executions: AtomicUsize,
}

/// Engine that answers registered query texts with scripted results
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: RwLock<HashMap<String, ScriptedResult>>,
    stats: Arc<EngineStats>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the result returned for `sql` (matched after trimming)
    pub fn register(&self, sql: &str, result: ScriptedResult) {
        self.scripts.write().insert(sql.trim().to_string(), result);
    }

    /// Builder-style variant of [`ScriptedEngine::register`]
    pub fn with_script(self, sql: &str, result: ScriptedResult) -> Self {
        self.register(sql, result);
        self
    }

    /// Number of cursors handed out and not yet dropped
    pub fn open_cursors(&self) -> usize {
        self.stats.open_cursors.load(Ordering::SeqCst)
    }

    /// Total number of successful row advances across all cursors
    pub fn rows_pulled(&self) -> usize {
        self.stats.rows_pulled.load(Ordering::SeqCst)
    }

    /// Number of `execute` calls that reached the engine
    pub fn executions(&self) -> usize {
        self.stats.executions.load(Ordering::SeqCst)
    }
}

impl QueryEngine for ScriptedEngine {
    fn execute(&self, sql: &str) -> EngineResult<Box<dyn RowCursor>> {
        self.stats.executions.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .read()
            .get(sql.trim())
            .cloned()
            .ok_or_else(|| EngineError::Execution(format!("no script registered for query: {}", sql.trim())))?;

        if let Some(message) = script.execution_error {
            return Err(EngineError::Execution(message));
        }

        self.stats.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedCursor {
            columns: script.columns,
            rows: script.rows,
            metadata_error: script.metadata_error,
            fail_after: script.fail_after,
            position: 0,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct ScriptedCursor {
    columns: Vec<Column>,
    rows: RowSource,
    metadata_error: Option<String>,
    fail_after: Option<(usize, String)>,
    position: usize,
    stats: Arc<EngineStats>,
}

impl RowCursor for ScriptedCursor {
    fn columns(&self) -> EngineResult<Vec<Column>> {
        match &self.metadata_error {
            Some(message) => Err(EngineError::Metadata(message.clone())),
            None => Ok(self.columns.clone()),
        }
    }

    fn advance(&mut self) -> EngineResult<Option<EngineRow>> {
        if let Some((rows, message)) = &self.fail_after {
            if self.position == *rows {
                return Err(EngineError::Cursor(message.clone()));
            }
        }

        match self.rows.row(self.position) {
            Some(row) => {
                self.position += 1;
                self.stats.rows_pulled.fetch_add(1, Ordering::SeqCst);
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }
}

impl Drop for ScriptedCursor {
    fn drop(&mut self) {
        self.stats.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}
