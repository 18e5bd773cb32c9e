use async_trait::async_trait;

use crate::error::Result;
use crate::frame::{DType, Value};

/// Name and engine type of one column in a query result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub dtype: DType,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        ResultColumn {
            name: name.into(),
            dtype,
        }
    }
}

/// A SQL Server session the engine drives.
///
/// One statement is in flight at a time; a cursor returned by `open_query`
/// borrows the session until it is exhausted or dropped.
#[async_trait]
pub trait SqlSession: Send {
    /// Executes a statement batch, discarding any result rows.
    async fn run(&mut self, sql: &str) -> Result<()>;

    /// Executes a query and returns a cursor over its first result set.
    async fn open_query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + Send + 'a>>;

    /// Begin a transaction
    async fn begin_transaction(&mut self) -> Result<()>;

    /// Commit a transaction
    async fn commit_transaction(&mut self) -> Result<()>;

    /// Rollback a transaction
    async fn rollback_transaction(&mut self) -> Result<()>;
}

/// Incremental access to one query's result rows.
#[async_trait]
pub trait RowCursor: Send {
    /// Result-set columns, fixed for the life of the cursor.
    fn columns(&self) -> &[ResultColumn];

    /// Fetches up to `max_rows` more rows; `None` once the set is exhausted.
    async fn fetch(&mut self, max_rows: usize) -> Result<Option<Vec<Vec<Value>>>>;
}
