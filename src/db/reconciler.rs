use crate::db::schema::{ColumnInfo, TableSchema};
use crate::db::session::SqlSession;
use crate::db::sql_generator;
use crate::db::type_mapper;
use crate::db::writer::{WriteMode, WriteOptions};
use crate::error::{Error, Result};
use crate::frame::{DataFrame, Value};

/// Everything the write path needs once the destination has been inspected.
#[derive(Debug, Clone)]
pub struct ResolvedWrite {
    /// DDL to run before any rows move, in order.
    pub setup: Vec<String>,
    /// Column list for INSERT statements; None inserts positionally.
    pub insert_columns: Option<Vec<String>>,
    /// Columns a MERGE carries from staging to target; empty outside upsert.
    pub merge_columns: Vec<String>,
}

/// Introspect a table through INFORMATION_SCHEMA.COLUMNS.
///
/// Returns None when the table does not exist.
pub async fn table_schema<S>(
    session: &mut S,
    schema_name: &str,
    table_name: &str,
) -> Result<Option<TableSchema>>
where
    S: SqlSession + ?Sized,
{
    let sql = sql_generator::information_schema_columns(schema_name, table_name);
    let mut columns = Vec::new();
    let mut cursor = session.open_query(&sql).await?;
    while let Some(rows) = cursor.fetch(256).await? {
        for row in rows {
            columns.push(parse_column_info(&row)?);
        }
    }
    if columns.is_empty() {
        Ok(None)
    } else {
        Ok(Some(TableSchema {
            schema_name: schema_name.to_string(),
            table_name: table_name.to_string(),
            columns,
        }))
    }
}

/// Work out setup DDL and column routing for a frame landing in a table.
pub async fn resolve<S>(
    session: &mut S,
    frame: &DataFrame,
    schema_name: &str,
    table_name: &str,
    options: &WriteOptions,
) -> Result<ResolvedWrite>
where
    S: SqlSession + ?Sized,
{
    validate_overrides(frame, options)?;
    let target = sql_generator::table_path(schema_name, table_name);
    let frame_columns: Vec<String> = frame
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    // Overwrite drops the old shape, so there is nothing worth inspecting.
    let existing = match options.mode {
        WriteMode::Overwrite => None,
        _ => table_schema(session, schema_name, table_name).await?,
    };

    let mut setup = Vec::new();
    match (&options.mode, &existing) {
        (WriteMode::Overwrite, _) => {
            setup.push(sql_generator::drop_table_if_exists(&target));
            setup.push(create_statement(&target, frame, options));
        }
        (_, None) => {
            setup.push(create_statement(&target, frame, options));
        }
        (WriteMode::Append, Some(schema)) => {
            if options.use_column_names {
                require_subset(&frame_columns, schema)?;
            }
            // Positional arity against an existing table is the engine's call.
        }
        (WriteMode::Upsert { .. }, Some(schema)) => {
            if options.use_column_names {
                require_subset(&frame_columns, schema)?;
            } else if frame.num_columns() != schema.columns.len() {
                return Err(Error::schema(format!(
                    "frame has {} columns but {} has {}",
                    frame.num_columns(),
                    target,
                    schema.columns.len()
                )));
            }
        }
    }

    let merge_columns = match (&options.mode, &existing) {
        (WriteMode::Upsert { .. }, Some(schema)) if !options.use_column_names => schema
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
        (WriteMode::Upsert { .. }, _) => frame_columns.clone(),
        _ => Vec::new(),
    };
    if let WriteMode::Upsert { conflict_columns } = &options.mode {
        for conflict in conflict_columns {
            // Same collation rule as require_subset.
            let known = merge_columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(conflict));
            if !known {
                return Err(Error::schema(format!(
                    "conflict column '{conflict}' is not among the written columns"
                )));
            }
        }
    }

    let insert_columns = options.use_column_names.then_some(frame_columns);
    Ok(ResolvedWrite {
        setup,
        insert_columns,
        merge_columns,
    })
}

fn require_subset(frame_columns: &[String], schema: &TableSchema) -> Result<()> {
    for name in frame_columns {
        // The server resolves identifiers case-insensitively under the
        // default collation, so the check does too.
        let known = schema
            .columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name));
        if !known {
            return Err(Error::schema(format!(
                "column '{}' does not exist in table {}.{}",
                name, schema.schema_name, schema.table_name
            )));
        }
    }
    Ok(())
}

fn create_statement(target: &str, frame: &DataFrame, options: &WriteOptions) -> String {
    let columns: Vec<(String, String)> = frame
        .columns()
        .iter()
        .map(|series| {
            let override_type = options.dtype.get(series.name()).map(String::as_str);
            (
                series.name().to_string(),
                type_mapper::sql_type_for(series, override_type, options.varchar_limit),
            )
        })
        .collect();
    sql_generator::create_table(target, &columns)
}

fn validate_overrides(frame: &DataFrame, options: &WriteOptions) -> Result<()> {
    for name in options.dtype.keys() {
        if frame.column(name).is_none() {
            return Err(Error::config(format!(
                "dtype override names unknown column '{name}'"
            )));
        }
    }
    Ok(())
}

fn parse_column_info(row: &[Value]) -> Result<ColumnInfo> {
    let name = row
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| Error::driver("INFORMATION_SCHEMA row is missing COLUMN_NAME"))?
        .to_string();
    let data_type = row
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::driver("INFORMATION_SCHEMA row is missing DATA_TYPE"))?
        .to_string();
    Ok(ColumnInfo {
        name,
        data_type,
        is_nullable: row
            .get(2)
            .and_then(Value::as_str)
            .map(|v| v.eq_ignore_ascii_case("YES"))
            .unwrap_or(true),
        max_length: row.get(3).and_then(Value::as_i64).map(|v| v as i32),
        precision: row.get(4).and_then(Value::as_i64).map(|v| v as i32),
        scale: row.get(5).and_then(Value::as_i64).map(|v| v as i32),
        default_value: row.get(6).and_then(Value::as_str).map(str::to_string),
        ordinal_position: row.get(7).and_then(Value::as_i64).unwrap_or(0) as i32,
    })
}
