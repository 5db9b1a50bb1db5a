use serde::Serialize;

use crate::db::{Row, Statement};

/// One logical operation against a database
#[derive(Debug, Clone)]
pub enum UnitOfWork {
    /// Insert, then read back inside the same read-write transaction
    WriteThenRead {
        insert: Statement,
        followup: Statement,
    },
    /// A single read with bound parameters
    ParameterizedRead { query: Statement },
    /// Schema statements applied as one long-running operation
    SchemaChange { statements: Vec<String> },
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    WriteThenRead { inserted: u64, rows: Vec<Row> },
    Rows { rows: Vec<Row> },
    SchemaChange { operation: String, statements: usize },
}
