use uuid::Uuid;

use crate::frame::Value;

/// Quote an identifier, doubling any closing bracket inside it.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quoted `[schema].[table]` path.
pub fn table_path(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

fn escape_str(s: &str) -> String {
    s.replace('\'', "''")
}

/// Render a value as an SQL literal.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => {
            if *b {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        Value::Int8(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Float32(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Utf8(s) => format!("'{}'", escape_str(s)),
        Value::Binary(bytes) => {
            let mut out = String::with_capacity(2 + bytes.len() * 2);
            out.push_str("0x");
            for b in bytes {
                out.push_str(&format!("{b:02X}"));
            }
            out
        }
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::Uuid(u) => format!("'{u}'"),
    }
}

/// Generate an INSERT for one or more rows.
///
/// `columns: None` omits the column list, leaving assignment positional.
pub fn insert_rows(target: &str, columns: Option<&[String]>, rows: &[Vec<&Value>]) -> String {
    let col_list = columns
        .map(|cols| {
            let quoted: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
            format!(" ({})", quoted.join(", "))
        })
        .unwrap_or_default();
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let vals: Vec<String> = row.iter().map(|v| literal(v)).collect();
            format!("({})", vals.join(", "))
        })
        .collect();
    format!("INSERT INTO {}{} VALUES {};", target, col_list, tuples.join(", "))
}

/// Generate a CREATE TABLE from (column, sql type) pairs.
pub fn create_table(target: &str, columns: &[(String, String)]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|(name, sql_type)| format!("{} {}", quote_ident(name), sql_type))
        .collect();
    format!("CREATE TABLE {} ({});", target, defs.join(", "))
}

/// Generate a guarded drop for the table at the quoted path.
pub fn drop_table_if_exists(target: &str) -> String {
    format!(
        "IF OBJECT_ID(N'{}', N'U') IS NOT NULL DROP TABLE {};",
        escape_str(target),
        target
    )
}

pub fn drop_table(target: &str) -> String {
    format!("DROP TABLE {};", target)
}

/// Clone a table's column structure into an empty staging table.
pub fn select_into_staging(staging: &str, source: &str, columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "SELECT {} INTO {} FROM {} WHERE 1 = 0;",
        quoted.join(", "),
        staging,
        source
    )
}

/// Generate the MERGE applying staged rows onto the target.
///
/// The WHEN MATCHED clause is omitted when every column is a conflict column.
pub fn merge_upsert(
    target: &str,
    staging: &str,
    columns: &[String],
    conflict_columns: &[String],
) -> String {
    let on_clause: Vec<String> = conflict_columns
        .iter()
        .map(|c| format!("target.{q} = source.{q}", q = quote_ident(c)))
        .collect();
    let update_cols: Vec<String> = columns
        .iter()
        .filter(|c| !conflict_columns.iter().any(|k| k.eq_ignore_ascii_case(c)))
        .map(|c| format!("target.{q} = source.{q}", q = quote_ident(c)))
        .collect();
    let insert_cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let insert_vals: Vec<String> = columns
        .iter()
        .map(|c| format!("source.{}", quote_ident(c)))
        .collect();

    let matched = if update_cols.is_empty() {
        String::new()
    } else {
        format!(" WHEN MATCHED THEN UPDATE SET {}", update_cols.join(", "))
    };
    format!(
        "MERGE INTO {} AS target USING {} AS source ON ({}){} \
         WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
        target,
        staging,
        on_clause.join(" AND "),
        matched,
        insert_cols.join(", "),
        insert_vals.join(", ")
    )
}

/// Column metadata query for one table, ordered by ordinal position.
pub fn information_schema_columns(schema: &str, table: &str) -> String {
    format!(
        "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, \
                CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, NUMERIC_SCALE, \
                COLUMN_DEFAULT, ORDINAL_POSITION \
         FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
         ORDER BY ORDINAL_POSITION",
        escape_str(schema),
        escape_str(table)
    )
}

pub fn select_all(schema: &str, table: &str) -> String {
    format!("SELECT * FROM {}", table_path(schema, table))
}

/// Session-unique global temp table name for staging upsert payloads.
pub fn staging_table_name() -> String {
    format!("[##sqlframe_stage_{}]", Uuid::new_v4().simple())
}
