// Row Iterator
//
// Presents an engine cursor as a lazy, forward-only, single-pass sequence of
// rows. Column metadata is fetched once at construction; rows are pulled one
// at a time and handed out without being retained.

use crate::engine::{EngineError, EngineResult, EngineRow, RowCursor};
use crate::query::column::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IteratorState {
    Open,
    Exhausted,
    Failed,
}

/// Forward-only iterator over one executing result set.
///
/// Not meant to be shared between threads; the owning session pulls from it
/// sequentially. Dropping the iterator releases the underlying cursor.
pub struct RowIterator {
    cursor: Option<Box<dyn RowCursor>>,
    columns: Vec<Column>,
    state: IteratorState,
    rows_read: usize,
}

impl RowIterator {
    /// Bind to an executing cursor, reading its column metadata up front.
    /// A cursor whose metadata cannot be read is released immediately.
    pub fn new(cursor: Box<dyn RowCursor>) -> EngineResult<Self> {
        let columns = cursor.columns()?;
        Ok(Self {
            cursor: Some(cursor),
            columns,
            state: IteratorState::Open,
            rows_read: 0,
        })
    }

    /// Column metadata, stable for the iterator's lifetime
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of rows handed out so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == IteratorState::Exhausted
    }

    /// Advance by exactly one row.
    ///
    /// Returns `Ok(None)` once the result set is exhausted, and keeps doing so
    /// without touching the cursor again. A cursor error is fatal: the cursor
    /// is released and later calls return `EngineError::CursorFailed`.
    pub fn next_row(&mut self) -> EngineResult<Option<EngineRow>> {
        match self.state {
            IteratorState::Exhausted => return Ok(None),
            IteratorState::Failed => return Err(EngineError::CursorFailed),
            IteratorState::Open => {}
        }

        let cursor = match self.cursor.as_mut() {
            Some(cursor) => cursor,
            None => {
                self.state = IteratorState::Exhausted;
                return Ok(None);
            }
        };

        match cursor.advance() {
            Ok(Some(row)) => {
                if row.len() != self.columns.len() {
                    let err = EngineError::RowWidth {
                        expected: self.columns.len(),
                        actual: row.len(),
                    };
                    self.fail();
                    return Err(err);
                }
                self.rows_read += 1;
                Ok(Some(row))
            }
            Ok(None) => {
                self.state = IteratorState::Exhausted;
                self.cursor = None;
                Ok(None)
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    /// Release the cursor without reading further rows
    pub fn close(&mut self) {
        self.cursor = None;
        if self.state == IteratorState::Open {
            self.state = IteratorState::Exhausted;
        }
    }

    fn fail(&mut self) {
        self.state = IteratorState::Failed;
        self.cursor = None;
    }
}

impl Iterator for RowIterator {
    type Item = EngineResult<EngineRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            IteratorState::Open => self.next_row().transpose(),
            _ => None,
        }
    }
}

impl std::iter::FusedIterator for RowIterator {}
