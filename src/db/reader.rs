use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::session::{ResultColumn, RowCursor, SqlSession};
use crate::db::sql_generator;
use crate::db::type_mapper;
use crate::error::{Error, Result};
use crate::frame::{DType, DataFrame, Series, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Rows per frame for the chunked variants; absent or zero reads
    /// everything into one frame.
    pub chunksize: Option<usize>,
    /// Engine type overrides by result column name.
    pub dtype: HashMap<String, DType>,
}

/// Run a query and collect its first result set into one frame.
pub async fn read_sql_query<S>(
    session: &mut S,
    sql: &str,
    options: &ReadOptions,
) -> Result<DataFrame>
where
    S: SqlSession + ?Sized,
{
    let mut chunks = open_chunks(session, sql, options, None).await?;
    match chunks.next_chunk().await? {
        Some(frame) => Ok(frame),
        None => empty_frame(chunks.columns()),
    }
}

/// Run a query and stream frames of at most `chunksize` rows each.
pub async fn read_sql_query_chunked<'a, S>(
    session: &'a mut S,
    sql: &str,
    options: &ReadOptions,
) -> Result<FrameChunks<'a>>
where
    S: SqlSession + ?Sized,
{
    let size = options.chunksize.filter(|n| *n > 0);
    open_chunks(session, sql, options, size).await
}

/// Read a whole table, in select-star column order.
pub async fn read_sql_table<S>(
    session: &mut S,
    schema_name: &str,
    table_name: &str,
    options: &ReadOptions,
) -> Result<DataFrame>
where
    S: SqlSession + ?Sized,
{
    let sql = sql_generator::select_all(schema_name, table_name);
    read_sql_query(session, &sql, options).await
}

pub async fn read_sql_table_chunked<'a, S>(
    session: &'a mut S,
    schema_name: &str,
    table_name: &str,
    options: &ReadOptions,
) -> Result<FrameChunks<'a>>
where
    S: SqlSession + ?Sized,
{
    let sql = sql_generator::select_all(schema_name, table_name);
    read_sql_query_chunked(session, &sql, options).await
}

/// Frames streamed off an open cursor.
///
/// Holds the session's cursor until dropped, so finish with it before issuing
/// other statements.
pub struct FrameChunks<'a> {
    cursor: Box<dyn RowCursor + Send + 'a>,
    columns: Vec<ResultColumn>,
    chunksize: Option<usize>,
}

impl FrameChunks<'_> {
    /// Result columns after overrides, in select order.
    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    pub async fn next_chunk(&mut self) -> Result<Option<DataFrame>> {
        let limit = self.chunksize.unwrap_or(usize::MAX);
        match self.cursor.fetch(limit).await? {
            Some(rows) => Ok(Some(rows_to_frame(&self.columns, rows)?)),
            None => Ok(None),
        }
    }

    /// Drain the cursor into a vector of frames.
    pub async fn collect(mut self) -> Result<Vec<DataFrame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_chunk().await? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

async fn open_chunks<'a, S>(
    session: &'a mut S,
    sql: &str,
    options: &ReadOptions,
    chunksize: Option<usize>,
) -> Result<FrameChunks<'a>>
where
    S: SqlSession + ?Sized,
{
    let cursor = session.open_query(sql).await?;
    let mut columns = cursor.columns().to_vec();
    for name in options.dtype.keys() {
        if !columns.iter().any(|c| &c.name == name) {
            return Err(Error::config(format!(
                "dtype override for unknown result column '{name}'"
            )));
        }
    }
    for column in &mut columns {
        if let Some(dtype) = options.dtype.get(&column.name) {
            column.dtype = *dtype;
        }
    }
    Ok(FrameChunks {
        cursor,
        columns,
        chunksize,
    })
}

fn rows_to_frame(columns: &[ResultColumn], rows: Vec<Vec<Value>>) -> Result<DataFrame> {
    let mut cells: Vec<Vec<Value>> = columns
        .iter()
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();
    for row in rows {
        if row.len() != columns.len() {
            return Err(Error::driver(format!(
                "row has {} values, result set has {} columns",
                row.len(),
                columns.len()
            )));
        }
        for ((slot, column), value) in cells.iter_mut().zip(columns).zip(row) {
            slot.push(type_mapper::cast_value(value, column.dtype)?);
        }
    }
    let series = columns
        .iter()
        .zip(cells)
        .map(|(column, values)| Series::new(&column.name, column.dtype, values))
        .collect::<Result<Vec<_>>>()?;
    DataFrame::new(series)
}

fn empty_frame(columns: &[ResultColumn]) -> Result<DataFrame> {
    let series = columns
        .iter()
        .map(|c| Series::new(&c.name, c.dtype, Vec::new()))
        .collect::<Result<Vec<_>>>()?;
    DataFrame::new(series)
}
