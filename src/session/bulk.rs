// Bulk Query Path
//
// Materializes a whole result before returning it. Runs through the same
// session pipeline as streaming, so the encoding is identical; a failure
// discards whatever was collected.

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::engine::EngineHandle;
use crate::query::column::Column;
use crate::session::error::SessionResult;
use crate::session::sink::CollectingSink;
use crate::session::StreamingSession;
use crate::wire::message::{QueryRequest, QueryResponse, WireRow};

/// A complete, encoded result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDocument {
    columns: Vec<Column>,
    rows: Vec<WireRow>,
}

impl QueryDocument {
    pub fn new(columns: Vec<Column>, rows: Vec<WireRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[WireRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn into_parts(self) -> (Vec<Column>, Vec<WireRow>) {
        (self.columns, self.rows)
    }

    fn from_responses(responses: Vec<QueryResponse>) -> Self {
        let mut columns = Vec::new();
        let mut rows = Vec::new();
        for response in responses {
            match response {
                QueryResponse::Header(header) => columns = header.columns,
                QueryResponse::Row(row) => rows.push(row),
            }
        }
        Self { columns, rows }
    }
}

/// Run `request` to completion and return every row
pub fn materialize(engine: &EngineHandle, request: &QueryRequest, config: &SessionConfig) -> SessionResult<QueryDocument> {
    let mut sink = CollectingSink::new();
    StreamingSession::new(engine.clone(), config.clone()).run(request, &mut sink)?;
    Ok(QueryDocument::from_responses(sink.into_responses()))
}
