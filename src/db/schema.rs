use serde::{Deserialize, Serialize};

use crate::db::type_mapper;
use crate::frame::DType;

/// A destination table as reported by INFORMATION_SCHEMA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Represents a column in a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub max_length: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub default_value: Option<String>,
    pub ordinal_position: i32,
}

impl ColumnInfo {
    /// Engine type this column reads back as. DATA_TYPE alone cannot carry
    /// precision and scale, so those come from the numeric columns.
    pub fn dtype(&self) -> DType {
        match type_mapper::dtype_for(&self.data_type) {
            DType::Decimal { precision, scale } => DType::Decimal {
                precision: self
                    .precision
                    .and_then(|p| u8::try_from(p).ok())
                    .unwrap_or(precision),
                scale: self
                    .scale
                    .and_then(|s| u8::try_from(s).ok())
                    .unwrap_or(scale),
            },
            other => other,
        }
    }
}
