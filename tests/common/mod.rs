#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlframe::{DType, Error, Result, ResultColumn, RowCursor, SqlSession, Value};

enum ScriptedResult {
    Rows {
        columns: Vec<ResultColumn>,
        rows: Vec<Vec<Value>>,
    },
    Error(String),
}

/// Scripted stand-in for a live session.
///
/// Records every statement it is handed and serves queued results to queries
/// in order. A query with nothing queued gets an empty result set, which is
/// also what INFORMATION_SCHEMA reports for an absent table.
pub struct MockSession {
    pub statements: Vec<String>,
    results: VecDeque<ScriptedResult>,
    fail_on: Option<(String, String)>,
    released: Arc<AtomicBool>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            results: VecDeque::new(),
            fail_on: None,
            released: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Queue a result set for the next query.
    pub fn expect_query(&mut self, columns: Vec<ResultColumn>, rows: Vec<Vec<Value>>) {
        self.results.push_back(ScriptedResult::Rows { columns, rows });
    }

    /// Queue a failure for the next query.
    pub fn expect_query_error(&mut self, message: &str) {
        self.results
            .push_back(ScriptedResult::Error(message.to_string()));
    }

    /// Fail any statement containing `needle`.
    pub fn fail_on_statement(&mut self, needle: &str, message: &str) {
        self.fail_on = Some((needle.to_string(), message.to_string()));
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.statements.iter().filter(|s| s.contains(needle)).count()
    }

    pub fn find_matching(&self, needle: &str) -> Option<&String> {
        self.statements.iter().find(|s| s.contains(needle))
    }

    /// Whether the most recently opened cursor has been dropped.
    pub fn cursor_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlSession for MockSession {
    async fn run(&mut self, sql: &str) -> Result<()> {
        self.statements.push(sql.to_string());
        if let Some((needle, message)) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(Error::Driver(message.clone()));
            }
        }
        Ok(())
    }

    async fn open_query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + Send + 'a>> {
        self.statements.push(sql.to_string());
        match self.results.pop_front() {
            Some(ScriptedResult::Error(message)) => Err(Error::Driver(message)),
            Some(ScriptedResult::Rows { columns, rows }) => {
                self.released.store(false, Ordering::SeqCst);
                Ok(Box::new(MockCursor {
                    columns,
                    rows: rows.into(),
                    released: Arc::clone(&self.released),
                }))
            }
            None => {
                self.released.store(false, Ordering::SeqCst);
                Ok(Box::new(MockCursor {
                    columns: Vec::new(),
                    rows: VecDeque::new(),
                    released: Arc::clone(&self.released),
                }))
            }
        }
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.run("BEGIN TRANSACTION").await
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        self.run("COMMIT TRANSACTION").await
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        self.run("ROLLBACK TRANSACTION").await
    }
}

struct MockCursor {
    columns: Vec<ResultColumn>,
    rows: VecDeque<Vec<Value>>,
    released: Arc<AtomicBool>,
}

#[async_trait]
impl RowCursor for MockCursor {
    fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Option<Vec<Vec<Value>>>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let take = max_rows.min(self.rows.len());
        Ok(Some(self.rows.drain(..take).collect()))
    }
}

impl Drop for MockCursor {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Result columns of the INFORMATION_SCHEMA.COLUMNS query, in select order.
pub fn information_schema_result_columns() -> Vec<ResultColumn> {
    vec![
        ResultColumn::new("COLUMN_NAME", DType::Utf8),
        ResultColumn::new("DATA_TYPE", DType::Utf8),
        ResultColumn::new("IS_NULLABLE", DType::Utf8),
        ResultColumn::new("CHARACTER_MAXIMUM_LENGTH", DType::Int64),
        ResultColumn::new("NUMERIC_PRECISION", DType::Int64),
        ResultColumn::new("NUMERIC_SCALE", DType::Int64),
        ResultColumn::new("COLUMN_DEFAULT", DType::Utf8),
        ResultColumn::new("ORDINAL_POSITION", DType::Int64),
    ]
}

/// One INFORMATION_SCHEMA.COLUMNS row for a column with no default.
pub fn information_schema_row(
    name: &str,
    data_type: &str,
    nullable: bool,
    ordinal: i64,
) -> Vec<Value> {
    vec![
        Value::Utf8(name.to_string()),
        Value::Utf8(data_type.to_string()),
        Value::Utf8(if nullable { "YES" } else { "NO" }.to_string()),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Int64(ordinal),
    ]
}
