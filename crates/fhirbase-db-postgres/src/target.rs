//! The write side of a load: where rows end up.

use async_trait::async_trait;

use crate::error::Result;

/// Columns written for every resource, in order.
pub const LOAD_COLUMNS: [&str; 4] = ["id", "txid", "status", "resource"];

/// Transaction id stored with freshly loaded resources.
pub const LOAD_TXID: i64 = 0;

/// Status stored with freshly loaded resources.
pub const LOAD_STATUS: &str = "created";

/// One resource ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRow {
    /// `None` lets the database generate the id.
    pub id: Option<String>,
    /// Serialized, transformed resource.
    pub resource: String,
}

/// An `INSERT ... ON CONFLICT (id) DO NOTHING` waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub table: String,
    pub row: LoadRow,
}

/// Statements accumulated by the insert loader between flushes.
#[derive(Debug, Default)]
pub struct LoadBatch {
    statements: Vec<InsertStatement>,
}

impl LoadBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            statements: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, table: String, row: LoadRow) {
        self.statements.push(InsertStatement { table, row });
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[InsertStatement] {
        &self.statements
    }

    pub fn clear(&mut self) {
        self.statements.clear();
    }
}

/// Row iterator consumed by [`LoadTarget::copy_rows`].
///
/// `advance` returns true when a row of the current run is ready in
/// `current_row_values`, and false once the run ends: either the next
/// resource has another type or the input is exhausted.
pub trait CopySource: Send {
    fn advance(&mut self) -> Result<bool>;

    /// Resource type of the current run.
    fn current_type_name(&self) -> &str;

    /// Takes the row prepared by the last successful `advance`.
    fn current_row_values(&mut self) -> Option<LoadRow>;
}

/// Destination of a load.
///
/// The Postgres implementation is [`PgTarget`](crate::PgTarget); tests use
/// an in-memory recorder.
#[async_trait]
pub trait LoadTarget: Send {
    /// Bulk-copies every row of the current run into `table` and returns
    /// the number of rows written.
    async fn copy_rows(&mut self, table: &str, rows: &mut dyn CopySource) -> Result<u64>;

    /// Sends all statements of `batch` and waits for them to complete.
    async fn send_batch(&mut self, batch: &LoadBatch) -> Result<()>;
}
