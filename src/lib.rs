pub mod db;
pub mod error;
pub mod frame;

pub use db::connection::{ConnectOptions, Connection};
pub use db::reader::{
    read_sql_query, read_sql_query_chunked, read_sql_table, read_sql_table_chunked, FrameChunks,
    ReadOptions,
};
pub use db::reconciler::table_schema;
pub use db::schema::{ColumnInfo, TableSchema};
pub use db::session::{ResultColumn, RowCursor, SqlSession};
pub use db::writer::{to_sql, WriteMode, WriteOptions, WriteReport};
pub use error::{Error, Result};
pub use frame::{DType, DataFrame, Decimal, ParseDecimalError, Series, Value};
