mod value;

pub use value::{DType, Decimal, ParseDecimalError, Value};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A named, typed column of nullable values.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    dtype: DType,
    values: Vec<Value>,
}

impl Series {
    /// Builds a series, checking every value against the declared dtype.
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<Value>) -> Result<Series> {
        let name = name.into();
        for (idx, value) in values.iter().enumerate() {
            if !value_matches(value, dtype) {
                return Err(Error::config(format!(
                    "value at row {idx} of column '{name}' does not match dtype {dtype:?}"
                )));
            }
        }
        Ok(Series {
            name,
            dtype,
            values,
        })
    }

    pub fn bool(name: impl Into<String>, values: Vec<Option<bool>>) -> Series {
        Self::from_options(name, DType::Bool, values, Value::Bool)
    }

    pub fn int8(name: impl Into<String>, values: Vec<Option<i8>>) -> Series {
        Self::from_options(name, DType::Int8, values, Value::Int8)
    }

    pub fn int16(name: impl Into<String>, values: Vec<Option<i16>>) -> Series {
        Self::from_options(name, DType::Int16, values, Value::Int16)
    }

    pub fn int32(name: impl Into<String>, values: Vec<Option<i32>>) -> Series {
        Self::from_options(name, DType::Int32, values, Value::Int32)
    }

    pub fn int64(name: impl Into<String>, values: Vec<Option<i64>>) -> Series {
        Self::from_options(name, DType::Int64, values, Value::Int64)
    }

    pub fn float32(name: impl Into<String>, values: Vec<Option<f32>>) -> Series {
        Self::from_options(name, DType::Float32, values, Value::Float32)
    }

    pub fn float64(name: impl Into<String>, values: Vec<Option<f64>>) -> Series {
        Self::from_options(name, DType::Float64, values, Value::Float64)
    }

    pub fn utf8<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Series {
        Self::from_options(name, DType::Utf8, values, |s| Value::Utf8(s.into()))
    }

    pub fn binary(name: impl Into<String>, values: Vec<Option<Vec<u8>>>) -> Series {
        Self::from_options(name, DType::Binary, values, Value::Binary)
    }

    pub fn decimal(
        name: impl Into<String>,
        precision: u8,
        scale: u8,
        values: Vec<Option<Decimal>>,
    ) -> Series {
        Self::from_options(
            name,
            DType::Decimal { precision, scale },
            values,
            Value::Decimal,
        )
    }

    pub fn date(name: impl Into<String>, values: Vec<Option<NaiveDate>>) -> Series {
        Self::from_options(name, DType::Date, values, Value::Date)
    }

    pub fn time(name: impl Into<String>, values: Vec<Option<NaiveTime>>) -> Series {
        Self::from_options(name, DType::Time, values, Value::Time)
    }

    pub fn datetime(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Series {
        Self::from_options(name, DType::DateTime, values, Value::DateTime)
    }

    pub fn uuid(name: impl Into<String>, values: Vec<Option<Uuid>>) -> Series {
        Self::from_options(name, DType::Uuid, values, Value::Uuid)
    }

    /// An untyped all-null column of the given length.
    pub fn nulls(name: impl Into<String>, len: usize) -> Series {
        Series {
            name: name.into(),
            dtype: DType::Null,
            values: vec![Value::Null; len],
        }
    }

    fn from_options<T>(
        name: impl Into<String>,
        dtype: DType,
        values: Vec<Option<T>>,
        wrap: impl Fn(T) -> Value,
    ) -> Series {
        Series {
            name: name.into(),
            dtype,
            values: values
                .into_iter()
                .map(|v| v.map(&wrap).unwrap_or(Value::Null))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    fn slice(&self, offset: usize, len: usize) -> Series {
        let start = offset.min(self.values.len());
        let end = offset.saturating_add(len).min(self.values.len());
        Series {
            name: self.name.clone(),
            dtype: self.dtype,
            values: self.values[start..end].to_vec(),
        }
    }
}

fn value_matches(value: &Value, dtype: DType) -> bool {
    match (value, dtype) {
        (Value::Null, _) => true,
        (Value::Bool(_), DType::Bool) => true,
        (Value::Int8(_), DType::Int8) => true,
        (Value::Int16(_), DType::Int16) => true,
        (Value::Int32(_), DType::Int32) => true,
        (Value::Int64(_), DType::Int64) => true,
        (Value::Float32(_), DType::Float32) => true,
        (Value::Float64(_), DType::Float64) => true,
        (Value::Decimal(_), DType::Decimal { .. }) => true,
        (Value::Utf8(_), DType::Utf8) => true,
        (Value::Binary(_), DType::Binary) => true,
        (Value::Date(_), DType::Date) => true,
        (Value::Time(_), DType::Time) => true,
        (Value::DateTime(_), DType::DateTime) => true,
        (Value::Uuid(_), DType::Uuid) => true,
        _ => false,
    }
}

/// Ordered collection of equal-length series with unique names.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    columns: Vec<Series>,
}

impl DataFrame {
    pub fn new(columns: Vec<Series>) -> Result<DataFrame> {
        if let Some(first) = columns.first() {
            let rows = first.len();
            for col in &columns {
                if col.len() != rows {
                    return Err(Error::config(format!(
                        "column '{}' has {} rows, expected {}",
                        col.name(),
                        col.len(),
                        rows
                    )));
                }
            }
        }
        for (idx, col) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|c| c.name() == col.name()) {
                return Err(Error::config(format!(
                    "duplicate column name '{}'",
                    col.name()
                )));
            }
        }
        Ok(DataFrame { columns })
    }

    /// Builds a frame from JSON records (array of flat objects).
    ///
    /// Columns appear in first-seen key order; keys missing from a record
    /// become nulls. Numbers map to Int64 or Float64 (a column mixing both is
    /// promoted to Float64); nested arrays and objects are rejected.
    pub fn from_records(records: &[serde_json::Value]) -> Result<DataFrame> {
        let mut names: Vec<String> = Vec::new();
        let mut data: Vec<Vec<Value>> = Vec::new();

        for (row_idx, record) in records.iter().enumerate() {
            let obj = record.as_object().ok_or_else(|| {
                Error::config(format!("record {row_idx} is not a JSON object"))
            })?;
            for (key, json) in obj {
                let col_idx = match names.iter().position(|n| n == key) {
                    Some(idx) => idx,
                    None => {
                        names.push(key.clone());
                        data.push(vec![Value::Null; row_idx]);
                        names.len() - 1
                    }
                };
                data[col_idx].push(json_to_value(key, json)?);
            }
            for values in data.iter_mut() {
                if values.len() < row_idx + 1 {
                    values.push(Value::Null);
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for (name, values) in names.into_iter().zip(data) {
            columns.push(infer_column(name, values)?);
        }
        DataFrame::new(columns)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Series::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns), the shape tuple.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    pub fn columns(&self) -> &[Series] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Series> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Series::name).collect()
    }

    /// One row as a vector of borrowed cells, in column order.
    pub fn row(&self, idx: usize) -> Option<Vec<&Value>> {
        if idx >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[idx]).collect())
    }

    /// Up to `len` rows starting at `offset`; bounds past the end clamp.
    pub fn slice(&self, offset: usize, len: usize) -> DataFrame {
        DataFrame {
            columns: self.columns.iter().map(|c| c.slice(offset, len)).collect(),
        }
    }

    /// Concatenates frames sharing the same column names and dtypes, in order.
    pub fn concat(frames: Vec<DataFrame>) -> Result<DataFrame> {
        let mut iter = frames.into_iter();
        let mut base = iter
            .next()
            .ok_or_else(|| Error::config("cannot concatenate zero frames"))?;
        for frame in iter {
            if frame.num_columns() != base.num_columns() {
                return Err(Error::config("frame column counts differ"));
            }
            for (dst, src) in base.columns.iter_mut().zip(frame.columns) {
                if dst.name != src.name || dst.dtype != src.dtype {
                    return Err(Error::config(format!(
                        "column '{}' does not line up across frames",
                        src.name
                    )));
                }
                dst.values.extend(src.values);
            }
        }
        Ok(base)
    }
}

fn json_to_value(column: &str, json: &serde_json::Value) -> Result<Value> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int64(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float64(f))
            } else {
                Err(Error::config(format!(
                    "number out of range in column '{column}'"
                )))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Utf8(s.clone())),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(Error::config(format!(
            "nested JSON in column '{column}' is not supported"
        ))),
    }
}

fn infer_column(name: String, mut values: Vec<Value>) -> Result<Series> {
    let mut dtype: Option<DType> = None;
    for value in &values {
        let Some(vt) = value.dtype() else { continue };
        dtype = Some(match dtype {
            None => vt,
            Some(cur) if cur == vt => cur,
            Some(DType::Int64) if vt == DType::Float64 => DType::Float64,
            Some(DType::Float64) if vt == DType::Int64 => DType::Float64,
            Some(cur) => {
                return Err(Error::config(format!(
                    "column '{name}' mixes {cur:?} and {vt:?}"
                )))
            }
        });
    }
    let dtype = dtype.unwrap_or(DType::Null);
    if dtype == DType::Float64 {
        for value in values.iter_mut() {
            if let Value::Int64(i) = value {
                *value = Value::Float64(*i as f64);
            }
        }
    }
    Series::new(name, dtype, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_rejects_unequal_lengths() {
        let result = DataFrame::new(vec![
            Series::int64("a", vec![Some(1), Some(2)]),
            Series::int64("b", vec![Some(1)]),
        ]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn frame_rejects_duplicate_names() {
        let result = DataFrame::new(vec![
            Series::int64("a", vec![Some(1)]),
            Series::utf8("a", vec![Some("x")]),
        ]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn series_new_checks_dtype() {
        let result = Series::new("a", DType::Int64, vec![Value::Utf8("x".into())]);
        assert!(result.is_err());

        let ok = Series::new("a", DType::Int64, vec![Value::Null, Value::Int64(7)]).unwrap();
        assert_eq!(ok.len(), 2);
    }

    #[test]
    fn slice_and_concat_round_trip() {
        let df = DataFrame::new(vec![
            Series::int64("id", (0..10).map(Some).collect()),
            Series::utf8("name", (0..10).map(|i| Some(format!("r{i}"))).collect()),
        ])
        .unwrap();

        let parts = vec![df.slice(0, 3), df.slice(3, 3), df.slice(6, 4)];
        assert_eq!(DataFrame::concat(parts).unwrap(), df);
    }

    #[test]
    fn slice_clamps_out_of_range_bounds() {
        let df = DataFrame::new(vec![Series::int64("id", (0..3).map(Some).collect())]).unwrap();

        let tail = df.slice(1, 100);
        assert_eq!(
            tail.column("id").unwrap(),
            &Series::int64("id", vec![Some(1), Some(2)])
        );
        assert_eq!(df.slice(10, 5).num_rows(), 0);
        assert_eq!(df.slice(usize::MAX, 1).num_rows(), 0);
        assert_eq!(df.slice(2, usize::MAX).num_rows(), 1);
    }

    #[test]
    fn concat_rejects_mismatched_columns() {
        let a = DataFrame::new(vec![Series::int64("id", vec![Some(1)])]).unwrap();
        let b = DataFrame::new(vec![Series::utf8("id", vec![Some("x")])]).unwrap();
        assert!(DataFrame::concat(vec![a, b]).is_err());
    }

    #[test]
    fn from_records_keeps_key_order_and_backfills() {
        let df = DataFrame::from_records(&[
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b", "score": 1.5}),
            json!({"id": 3}),
        ])
        .unwrap();

        assert_eq!(df.column_names(), vec!["id", "name", "score"]);
        assert_eq!(df.shape(), (3, 3));
        assert_eq!(df.column("score").unwrap().values()[0], Value::Null);
        assert_eq!(df.column("name").unwrap().values()[2], Value::Null);
        assert_eq!(df.column("id").unwrap().dtype(), DType::Int64);
    }

    #[test]
    fn from_records_promotes_mixed_numbers_to_float() {
        let df = DataFrame::from_records(&[json!({"x": 1}), json!({"x": 2.5})]).unwrap();
        let col = df.column("x").unwrap();
        assert_eq!(col.dtype(), DType::Float64);
        assert_eq!(col.values()[0], Value::Float64(1.0));
    }

    #[test]
    fn from_records_rejects_nested_json() {
        let result = DataFrame::from_records(&[json!({"x": [1, 2]})]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn all_null_column_has_null_dtype() {
        let df = DataFrame::from_records(&[json!({"x": null}), json!({"x": null})]).unwrap();
        assert_eq!(df.column("x").unwrap().dtype(), DType::Null);
    }
}
