use crate::error::{Error, Result};
use crate::frame::{DType, Decimal, Series, Value};

/// Resolves the SQL Server column type for a payload column.
///
/// An explicit override string wins verbatim. Otherwise integer columns take
/// the smallest type that holds the observed value range, and string columns
/// stay VARCHAR up to `varchar_limit` bytes before switching to VARCHAR(MAX).
pub fn sql_type_for(series: &Series, override_type: Option<&str>, varchar_limit: usize) -> String {
    if let Some(t) = override_type {
        return t.trim().to_string();
    }
    match series.dtype() {
        DType::Bool => "BIT".to_string(),
        DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64 => {
            match observed_int_range(series) {
                Some((min, max)) => integer_sql_type(min, max).to_string(),
                None => integer_fallback(series.dtype()).to_string(),
            }
        }
        DType::Float32 => "REAL".to_string(),
        DType::Float64 => "FLOAT".to_string(),
        DType::Decimal { precision, scale } => {
            format!("DECIMAL({},{})", precision.max(scale).max(1), scale)
        }
        DType::Utf8 => {
            let longest = series
                .values()
                .iter()
                .filter_map(Value::as_str)
                .map(str::len)
                .max()
                .unwrap_or(0);
            if longest > varchar_limit {
                "VARCHAR(MAX)".to_string()
            } else {
                format!("VARCHAR({})", varchar_limit)
            }
        }
        DType::Binary => "VARBINARY(MAX)".to_string(),
        DType::Date => "DATE".to_string(),
        DType::Time => "TIME".to_string(),
        DType::DateTime => "DATETIME2".to_string(),
        DType::Uuid => "UNIQUEIDENTIFIER".to_string(),
        DType::Null => "VARCHAR(MAX)".to_string(),
    }
}

fn observed_int_range(series: &Series) -> Option<(i64, i64)> {
    let mut range: Option<(i64, i64)> = None;
    for value in series.values() {
        if let Some(v) = value.as_i64() {
            range = Some(match range {
                Some((min, max)) => (min.min(v), max.max(v)),
                None => (v, v),
            });
        }
    }
    range
}

fn integer_sql_type(min: i64, max: i64) -> &'static str {
    if min >= 0 && max <= 255 {
        "TINYINT"
    } else if min >= i64::from(i16::MIN) && max <= i64::from(i16::MAX) {
        "SMALLINT"
    } else if min >= i64::from(i32::MIN) && max <= i64::from(i32::MAX) {
        "INT"
    } else {
        "BIGINT"
    }
}

// TINYINT is unsigned, so a typed-but-empty Int8 still needs SMALLINT.
fn integer_fallback(dtype: DType) -> &'static str {
    match dtype {
        DType::Int8 | DType::Int16 => "SMALLINT",
        DType::Int32 => "INT",
        _ => "BIGINT",
    }
}

/// Maps a SQL Server type name (as INFORMATION_SCHEMA reports it, with or
/// without a parenthesized length) to the engine type it is read back as.
///
/// All integer widths come back as Int64.
pub fn dtype_for(sql_type: &str) -> DType {
    let lower = sql_type.to_lowercase();
    let (base, args) = match lower.split_once('(') {
        Some((base, rest)) => (base.trim(), Some(rest.trim_end_matches(')'))),
        None => (lower.trim(), None),
    };
    match base {
        "bit" => DType::Bool,
        "tinyint" | "smallint" | "int" | "bigint" => DType::Int64,
        "real" => DType::Float32,
        "float" => DType::Float64,
        "decimal" | "numeric" => {
            let (precision, scale) = parse_precision(args).unwrap_or((18, 0));
            DType::Decimal { precision, scale }
        }
        "money" => DType::Decimal {
            precision: 19,
            scale: 4,
        },
        "smallmoney" => DType::Decimal {
            precision: 10,
            scale: 4,
        },
        "date" => DType::Date,
        "time" => DType::Time,
        "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" => DType::DateTime,
        "uniqueidentifier" => DType::Uuid,
        "binary" | "varbinary" | "image" | "rowversion" | "timestamp" => DType::Binary,
        _ => DType::Utf8,
    }
}

fn parse_precision(args: Option<&str>) -> Option<(u8, u8)> {
    let args = args?;
    let mut parts = args.split(',').map(str::trim);
    let precision = parts.next()?.parse().ok()?;
    let scale = parts.next().map(|s| s.parse().ok()).unwrap_or(Some(0))?;
    Some((precision, scale))
}

/// Applies a user-requested read cast. Lossy numeric casts are allowed and
/// truncate toward zero; a cast with no sensible meaning, or a decimal scale
/// the value cannot be expressed at, is a configuration error.
pub fn cast_value(value: Value, target: DType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let cast = match (&value, target) {
        (Value::Bool(_), DType::Bool)
        | (Value::Utf8(_), DType::Utf8)
        | (Value::Binary(_), DType::Binary)
        | (Value::Date(_), DType::Date)
        | (Value::Time(_), DType::Time)
        | (Value::DateTime(_), DType::DateTime)
        | (Value::Uuid(_), DType::Uuid) => Some(value.clone()),

        (Value::Bool(b), _) => cast_i64(i64::from(*b), target)?,
        (
            Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_),
            _,
        ) => match value.as_i64() {
            Some(v) => cast_i64(v, target)?,
            None => None,
        },
        (Value::Float32(_) | Value::Float64(_), _) => {
            value.as_f64().and_then(|v| cast_f64(v, target))
        }
        (Value::Decimal(d), _) => cast_decimal(*d, target),
        _ => None,
    };
    cast.ok_or_else(|| {
        Error::config(format!(
            "cannot cast {:?} to {:?}",
            value.dtype().unwrap_or(DType::Null),
            target
        ))
    })
}

// Ok(None) means the target makes no sense for an integer; Err means the
// target is fine but this value does not fit it.
fn cast_i64(v: i64, target: DType) -> Result<Option<Value>> {
    Ok(Some(match target {
        DType::Int8 => Value::Int8(v as i8),
        DType::Int16 => Value::Int16(v as i16),
        DType::Int32 => Value::Int32(v as i32),
        DType::Int64 => Value::Int64(v),
        DType::Float32 => Value::Float32(v as f32),
        DType::Float64 => Value::Float64(v as f64),
        DType::Decimal { precision, scale } => {
            let d = Decimal::new(i128::from(v), 0)
                .rescale(scale)
                .ok_or_else(|| {
                    Error::config(format!(
                        "value {v} does not fit DECIMAL({precision},{scale})"
                    ))
                })?;
            Value::Decimal(d)
        }
        _ => return Ok(None),
    }))
}

fn cast_f64(v: f64, target: DType) -> Option<Value> {
    match target {
        DType::Int8 => Some(Value::Int8(v as i8)),
        DType::Int16 => Some(Value::Int16(v as i16)),
        DType::Int32 => Some(Value::Int32(v as i32)),
        DType::Int64 => Some(Value::Int64(v as i64)),
        DType::Float32 => Some(Value::Float32(v as f32)),
        DType::Float64 => Some(Value::Float64(v)),
        _ => None,
    }
}

fn cast_decimal(d: Decimal, target: DType) -> Option<Value> {
    match target {
        DType::Int8 => Some(Value::Int8(d.trunc() as i8)),
        DType::Int16 => Some(Value::Int16(d.trunc() as i16)),
        DType::Int32 => Some(Value::Int32(d.trunc() as i32)),
        DType::Int64 => Some(Value::Int64(d.trunc() as i64)),
        DType::Float32 => Some(Value::Float32(d.to_f64() as f32)),
        DType::Float64 => Some(Value::Float64(d.to_f64())),
        // Values carry their own scale; the declared type does not narrow them.
        DType::Decimal { .. } => Some(Value::Decimal(d)),
        _ => None,
    }
}
