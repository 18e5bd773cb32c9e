use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::chunker::{self, Chunk};
use crate::db::reconciler::{self, ResolvedWrite};
use crate::db::session::SqlSession;
use crate::db::sql_generator;
use crate::error::{Error, Result};
use crate::frame::{DataFrame, Series, Value};

/// SQL Server caps a single VALUES list at this many rows.
const MAX_VALUES_ROWS: usize = 1000;

/// What to do when the destination table already holds rows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WriteMode {
    /// Drop and recreate the table, then insert.
    Overwrite,
    /// Insert after whatever is already there.
    #[default]
    Append,
    /// Merge on the conflict columns: update matches, insert the rest.
    Upsert { conflict_columns: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOptions {
    pub mode: WriteMode,
    /// Prepend a BIGINT "index" column holding 0-based row positions.
    pub index: bool,
    /// SQL type overrides by column name, applied when creating the table.
    pub dtype: HashMap<String, String>,
    /// Rows per transaction; absent or zero writes everything in one chunk.
    pub chunksize: Option<usize>,
    /// Batch many rows into each INSERT instead of one statement per row.
    pub fast_load: bool,
    /// Write with an explicit column list instead of positionally.
    pub use_column_names: bool,
    /// Longest VARCHAR before a string column becomes VARCHAR(MAX).
    pub varchar_limit: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            mode: WriteMode::default(),
            index: false,
            dtype: HashMap::new(),
            chunksize: None,
            fast_load: false,
            use_column_names: false,
            varchar_limit: 8000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub rows_written: usize,
    pub chunks: usize,
}

/// Write a frame into a SQL Server table, reconciling the schema first.
///
/// Each chunk inserts inside its own transaction. A failing chunk is rolled
/// back and ends the write; chunks committed before it stay in place.
pub async fn to_sql<S>(
    session: &mut S,
    frame: &DataFrame,
    schema_name: &str,
    table_name: &str,
    options: &WriteOptions,
) -> Result<WriteReport>
where
    S: SqlSession + ?Sized,
{
    validate(frame, options)?;
    if frame.num_rows() == 0 {
        return Ok(WriteReport {
            rows_written: 0,
            chunks: 0,
        });
    }
    let frame = if options.index {
        Cow::Owned(with_index(frame)?)
    } else {
        Cow::Borrowed(frame)
    };
    // The index column is always BIGINT, never narrowed to the observed range.
    let options = if options.index && !options.dtype.contains_key("index") {
        let mut patched = options.clone();
        patched
            .dtype
            .insert("index".to_string(), "BIGINT".to_string());
        Cow::Owned(patched)
    } else {
        Cow::Borrowed(options)
    };
    let resolved =
        reconciler::resolve(session, frame.as_ref(), schema_name, table_name, options.as_ref())
            .await?;
    for statement in &resolved.setup {
        session.run(statement).await?;
    }

    let target = sql_generator::table_path(schema_name, table_name);
    let chunks = chunker::plan(frame.num_rows(), options.chunksize);
    match &options.mode {
        WriteMode::Upsert { conflict_columns } => {
            upsert(
                session,
                &target,
                frame.as_ref(),
                &chunks,
                &resolved,
                conflict_columns,
                options.fast_load,
            )
            .await
        }
        _ => {
            let mut written = 0;
            for chunk in &chunks {
                let slice = frame.slice(chunk.offset, chunk.len);
                write_chunk(
                    session,
                    &target,
                    resolved.insert_columns.as_deref(),
                    &slice,
                    options.fast_load,
                )
                .await?;
                written += chunk.len;
            }
            Ok(WriteReport {
                rows_written: written,
                chunks: chunks.len(),
            })
        }
    }
}

fn validate(frame: &DataFrame, options: &WriteOptions) -> Result<()> {
    if frame.num_columns() == 0 {
        return Err(Error::config("frame has no columns"));
    }
    if options.varchar_limit == 0 {
        return Err(Error::config("varchar_limit must be at least 1"));
    }
    if let WriteMode::Upsert { conflict_columns } = &options.mode {
        if conflict_columns.is_empty() {
            return Err(Error::config(
                "upsert requires at least one conflict column",
            ));
        }
    }
    for series in frame.columns() {
        // FLOAT and REAL have no NaN or infinity on the server side.
        let non_finite = series.values().iter().any(|v| match v {
            Value::Float32(f) => !f.is_finite(),
            Value::Float64(f) => !f.is_finite(),
            _ => false,
        });
        if non_finite {
            return Err(Error::config(format!(
                "column '{}' holds a non-finite float",
                series.name()
            )));
        }
    }
    Ok(())
}

fn with_index(frame: &DataFrame) -> Result<DataFrame> {
    let positions = (0..frame.num_rows() as i64).map(Some).collect();
    let mut columns = vec![Series::int64("index", positions)];
    columns.extend(frame.columns().iter().cloned());
    DataFrame::new(columns)
}

async fn write_chunk<S>(
    session: &mut S,
    target: &str,
    columns: Option<&[String]>,
    slice: &DataFrame,
    fast_load: bool,
) -> Result<()>
where
    S: SqlSession + ?Sized,
{
    session.begin_transaction().await?;
    match insert_slice(session, target, columns, slice, fast_load).await {
        Ok(()) => session.commit_transaction().await,
        Err(e) => {
            if let Err(rollback) = session.rollback_transaction().await {
                log::warn!("rollback after failed insert also failed: {rollback}");
            }
            Err(e)
        }
    }
}

async fn insert_slice<S>(
    session: &mut S,
    target: &str,
    columns: Option<&[String]>,
    slice: &DataFrame,
    fast_load: bool,
) -> Result<()>
where
    S: SqlSession + ?Sized,
{
    let rows: Vec<Vec<&Value>> = (0..slice.num_rows()).filter_map(|i| slice.row(i)).collect();
    let batch = if fast_load { MAX_VALUES_ROWS } else { 1 };
    for group in rows.chunks(batch) {
        let sql = sql_generator::insert_rows(target, columns, group);
        session.run(&sql).await?;
    }
    Ok(())
}

async fn upsert<S>(
    session: &mut S,
    target: &str,
    frame: &DataFrame,
    chunks: &[Chunk],
    resolved: &ResolvedWrite,
    conflict_columns: &[String],
    fast_load: bool,
) -> Result<WriteReport>
where
    S: SqlSession + ?Sized,
{
    let staging = sql_generator::staging_table_name();
    session
        .run(&sql_generator::select_into_staging(
            &staging,
            target,
            &resolved.merge_columns,
        ))
        .await?;
    let outcome = stage_and_merge(
        session,
        target,
        &staging,
        frame,
        chunks,
        resolved,
        conflict_columns,
        fast_load,
    )
    .await;
    // The staging table is dropped whether or not the merge went through.
    if let Err(drop_err) = session.run(&sql_generator::drop_table(&staging)).await {
        log::warn!("failed to drop staging table {staging}: {drop_err}");
    }
    let written = outcome?;
    Ok(WriteReport {
        rows_written: written,
        chunks: chunks.len(),
    })
}

#[allow(clippy::too_many_arguments)]
async fn stage_and_merge<S>(
    session: &mut S,
    target: &str,
    staging: &str,
    frame: &DataFrame,
    chunks: &[Chunk],
    resolved: &ResolvedWrite,
    conflict_columns: &[String],
    fast_load: bool,
) -> Result<usize>
where
    S: SqlSession + ?Sized,
{
    let mut written = 0;
    for chunk in chunks {
        let slice = frame.slice(chunk.offset, chunk.len);
        write_chunk(
            session,
            staging,
            resolved.insert_columns.as_deref(),
            &slice,
            fast_load,
        )
        .await?;
        written += chunk.len;
    }

    let merge = sql_generator::merge_upsert(
        target,
        staging,
        &resolved.merge_columns,
        conflict_columns,
    );
    session.begin_transaction().await?;
    match session.run(&merge).await {
        Ok(()) => {
            session.commit_transaction().await?;
            Ok(written)
        }
        Err(e) => {
            if let Err(rollback) = session.rollback_transaction().await {
                log::warn!("rollback after failed merge also failed: {rollback}");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame() -> DataFrame {
        DataFrame::new(vec![Series::int64("c0", vec![Some(1), Some(2), Some(3)])]).unwrap()
    }

    #[test]
    fn test_upsert_requires_conflict_columns() {
        let options = WriteOptions {
            mode: WriteMode::Upsert {
                conflict_columns: vec![],
            },
            ..Default::default()
        };
        assert!(matches!(
            validate(&frame(), &options),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_column_frame_is_rejected() {
        let empty = DataFrame::new(vec![]).unwrap();
        assert!(matches!(
            validate(&empty, &WriteOptions::default()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        let nan = DataFrame::new(vec![Series::float64(
            "x",
            vec![Some(1.0), Some(f64::NAN)],
        )])
        .unwrap();
        assert!(matches!(
            validate(&nan, &WriteOptions::default()),
            Err(Error::Configuration(_))
        ));

        let inf = DataFrame::new(vec![Series::float32("x", vec![Some(f32::INFINITY)])]).unwrap();
        assert!(matches!(
            validate(&inf, &WriteOptions::default()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_with_index_prepends_positions() {
        let indexed = with_index(&frame()).unwrap();
        assert_eq!(indexed.column_names(), vec!["index", "c0"]);
        let positions: Vec<_> = indexed.column("index").unwrap().values().to_vec();
        assert_eq!(
            positions,
            vec![Value::Int64(0), Value::Int64(1), Value::Int64(2)]
        );
    }

    #[test]
    fn test_write_mode_serializes_tagged() {
        assert_eq!(
            serde_json::to_value(WriteMode::Append).unwrap(),
            json!({"mode": "append"})
        );
        assert_eq!(
            serde_json::to_value(WriteMode::Upsert {
                conflict_columns: vec!["id".to_string()]
            })
            .unwrap(),
            json!({"mode": "upsert", "conflict_columns": ["id"]})
        );
    }
}
