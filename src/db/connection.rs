use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Client, ColumnType, Config, EncryptionLevel, QueryItem, QueryStream};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::db::session::{ResultColumn, RowCursor, SqlSession};
use crate::error::{Error, Result};
use crate::frame::{DType, Decimal, Value};

/// Connection settings for a SQL Server instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// ADO.NET-style connection string. Takes precedence over the field-wise
    /// settings when present.
    pub connection_string: Option<String>,
    pub trust_cert: bool,
    pub connect_timeout_secs: u64,
    pub application_name: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            connection_string: None,
            trust_cert: true,
            connect_timeout_secs: 10,
            application_name: None,
        }
    }
}

fn build_tiberius_config(options: &ConnectOptions) -> Result<Config> {
    if let Some(ref conn_str) = options.connection_string {
        return Config::from_ado_string(conn_str)
            .map_err(|e| Error::Connect(format!("invalid connection string: {e}")));
    }

    let mut config = Config::new();
    if let Some(ref host) = options.host {
        config.host(host);
    }
    if let Some(port) = options.port {
        config.port(port);
    }
    if let Some(ref db) = options.database {
        config.database(db);
    }
    if let Some(ref app) = options.application_name {
        config.application_name(app);
    }
    match (&options.username, &options.password) {
        (Some(user), Some(pass)) => {
            config.authentication(AuthMethod::sql_server(user, pass));
        }
        _ => {
            config.authentication(AuthMethod::None);
        }
    }
    config.encryption(EncryptionLevel::Required);
    if options.trust_cert {
        config.trust_cert();
    }
    Ok(config)
}

/// An open SQL Server session.
///
/// Owns the TDS client; the `&mut` receiver on every operation is what keeps
/// one statement in flight at a time.
pub struct Connection {
    client: Client<Compat<TcpStream>>,
}

impl Connection {
    pub async fn connect(options: &ConnectOptions) -> Result<Connection> {
        let config = build_tiberius_config(options)?;
        let addr = config.get_addr();

        let connect = async {
            let tcp = TcpStream::connect(&addr)
                .await
                .map_err(|e| Error::Connect(format!("tcp connect to {addr} failed: {e}")))?;
            tcp.set_nodelay(true)
                .map_err(|e| Error::Connect(e.to_string()))?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| Error::Connect(format!("TDS handshake with {addr} failed: {e}")))
        };

        let client = if options.connect_timeout_secs == 0 {
            connect.await?
        } else {
            let limit = Duration::from_secs(options.connect_timeout_secs);
            tokio::time::timeout(limit, connect).await.map_err(|_| {
                Error::Connect(format!(
                    "connection to {addr} timed out after {}s",
                    options.connect_timeout_secs
                ))
            })??
        };
        Ok(Connection { client })
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[async_trait]
impl SqlSession for Connection {
    async fn run(&mut self, sql: &str) -> Result<()> {
        log::debug!("run: {sql}");
        // simple_query keeps statements in the session's own batch scope, so
        // temp tables created here stay visible to later statements.
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn open_query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + Send + 'a>> {
        log::debug!("query: {sql}");
        let mut stream = self.client.simple_query(sql).await?;
        let columns = match stream.columns().await? {
            Some(cols) => cols
                .iter()
                .map(|c| ResultColumn::new(c.name(), dtype_of(c.column_type())))
                .collect(),
            None => Vec::new(),
        };
        Ok(Box::new(TiberiusCursor {
            stream,
            columns,
            done: false,
        }))
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

struct TiberiusCursor<'a> {
    stream: QueryStream<'a>,
    columns: Vec<ResultColumn>,
    done: bool,
}

#[async_trait]
impl<'a> RowCursor for TiberiusCursor<'a> {
    fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Option<Vec<Vec<Value>>>> {
        if self.done {
            return Ok(None);
        }
        let mut rows = Vec::new();
        while rows.len() < max_rows {
            match self.stream.try_next().await? {
                Some(QueryItem::Metadata(meta)) => {
                    // Anything past the first result set is not ours to read.
                    if meta.result_index() > 0 {
                        self.done = true;
                        break;
                    }
                }
                Some(QueryItem::Row(row)) => {
                    if row.result_index() > 0 {
                        self.done = true;
                        break;
                    }
                    rows.push(decode_row(&row));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows))
        }
    }
}

/// Engine type a TDS column comes back as. Integer widths all widen to Int64.
fn dtype_of(column_type: ColumnType) -> DType {
    match column_type {
        ColumnType::Null => DType::Null,
        ColumnType::Bit | ColumnType::Bitn => DType::Bool,
        ColumnType::Int1
        | ColumnType::Int2
        | ColumnType::Int4
        | ColumnType::Int8
        | ColumnType::Intn => DType::Int64,
        ColumnType::Float4 => DType::Float32,
        ColumnType::Float8 | ColumnType::Floatn | ColumnType::Money | ColumnType::Money4 => {
            DType::Float64
        }
        // TDS metadata does not carry precision/scale here; the values do.
        ColumnType::Numericn | ColumnType::Decimaln => DType::Decimal {
            precision: 38,
            scale: 0,
        },
        ColumnType::Guid => DType::Uuid,
        ColumnType::Daten => DType::Date,
        ColumnType::Timen => DType::Time,
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2
        | ColumnType::DatetimeOffsetn => DType::DateTime,
        ColumnType::BigBinary | ColumnType::BigVarBin | ColumnType::Image => DType::Binary,
        _ => DType::Utf8,
    }
}

fn decode_row(row: &tiberius::Row) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_value(row, idx, col.column_type()))
        .collect()
}

/// Convert a single tiberius column value to a Value
fn decode_value(row: &tiberius::Row, idx: usize, column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::Null => Value::Null,
        ColumnType::Bit | ColumnType::Bitn => match row.try_get::<bool, _>(idx) {
            Ok(Some(v)) => Value::Bool(v),
            _ => Value::Null,
        },
        ColumnType::Int1 => match row.try_get::<u8, _>(idx) {
            Ok(Some(v)) => Value::Int64(i64::from(v)),
            _ => Value::Null,
        },
        ColumnType::Int2 => match row.try_get::<i16, _>(idx) {
            Ok(Some(v)) => Value::Int64(i64::from(v)),
            _ => Value::Null,
        },
        ColumnType::Int4 => match row.try_get::<i32, _>(idx) {
            Ok(Some(v)) => Value::Int64(i64::from(v)),
            _ => Value::Null,
        },
        ColumnType::Int8 => match row.try_get::<i64, _>(idx) {
            Ok(Some(v)) => Value::Int64(v),
            _ => Value::Null,
        },
        ColumnType::Intn => {
            if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
                Value::Int64(v)
            } else if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
                Value::Int64(i64::from(v))
            } else if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
                Value::Int64(i64::from(v))
            } else if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
                Value::Int64(i64::from(v))
            } else {
                Value::Null
            }
        }
        ColumnType::Float4 => match row.try_get::<f32, _>(idx) {
            Ok(Some(v)) => Value::Float32(v),
            _ => Value::Null,
        },
        ColumnType::Float8 | ColumnType::Money | ColumnType::Money4 => {
            match row.try_get::<f64, _>(idx) {
                Ok(Some(v)) => Value::Float64(v),
                _ => Value::Null,
            }
        }
        ColumnType::Floatn => {
            if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
                Value::Float64(v)
            } else if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
                Value::Float64(f64::from(v))
            } else {
                Value::Null
            }
        }
        ColumnType::Numericn | ColumnType::Decimaln => {
            match row.try_get::<tiberius::numeric::Numeric, _>(idx) {
                Ok(Some(n)) => Value::Decimal(Decimal::new(n.value(), n.scale())),
                _ => Value::Null,
            }
        }
        ColumnType::Guid => match row.try_get::<uuid::Uuid, _>(idx) {
            Ok(Some(v)) => Value::Uuid(v),
            _ => Value::Null,
        },
        ColumnType::Daten => match row.try_get::<chrono::NaiveDate, _>(idx) {
            Ok(Some(v)) => Value::Date(v),
            _ => Value::Null,
        },
        ColumnType::Timen => match row.try_get::<chrono::NaiveTime, _>(idx) {
            Ok(Some(v)) => Value::Time(v),
            _ => Value::Null,
        },
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2 => match row.try_get::<chrono::NaiveDateTime, _>(idx) {
            Ok(Some(v)) => Value::DateTime(v),
            _ => Value::Null,
        },
        ColumnType::DatetimeOffsetn => {
            match row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
                Ok(Some(v)) => Value::DateTime(v.naive_utc()),
                _ => Value::Null,
            }
        }
        ColumnType::BigBinary | ColumnType::BigVarBin | ColumnType::Image => {
            match row.try_get::<&[u8], _>(idx) {
                Ok(Some(v)) => Value::Binary(v.to_vec()),
                _ => Value::Null,
            }
        }
        _ => match row.try_get::<&str, _>(idx) {
            Ok(Some(v)) => Value::Utf8(v.to_string()),
            _ => Value::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_from_params() {
        let options = ConnectOptions {
            host: Some("myserver".to_string()),
            port: Some(1434),
            database: Some("mydb".to_string()),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        };
        let config = build_tiberius_config(&options).unwrap();
        assert_eq!(config.get_addr(), "myserver:1434");
    }

    #[test]
    fn test_build_config_defaults() {
        let config = build_tiberius_config(&ConnectOptions::default()).unwrap();
        assert_eq!(config.get_addr(), "localhost:1433");
    }

    #[test]
    fn test_build_config_from_connection_string() {
        let options = ConnectOptions {
            connection_string: Some(
                "Server=tcp:myserver,1433;Database=mydb;User Id=sa;Password=pass;".to_string(),
            ),
            ..Default::default()
        };
        let config = build_tiberius_config(&options).unwrap();
        assert_eq!(config.get_addr(), "myserver:1433");
    }

    #[test]
    fn test_build_config_rejects_garbage_connection_string() {
        let options = ConnectOptions {
            connection_string: Some("Server=tcp:myserver,notaport;Database=mydb;".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_tiberius_config(&options),
            Err(Error::Connect(_))
        ));
    }

    #[test]
    fn test_tds_types_widen_to_engine_types() {
        assert_eq!(dtype_of(ColumnType::Int1), DType::Int64);
        assert_eq!(dtype_of(ColumnType::Int8), DType::Int64);
        assert_eq!(dtype_of(ColumnType::Intn), DType::Int64);
        assert_eq!(dtype_of(ColumnType::Float4), DType::Float32);
        assert_eq!(dtype_of(ColumnType::Floatn), DType::Float64);
        assert_eq!(dtype_of(ColumnType::NVarchar), DType::Utf8);
        assert_eq!(dtype_of(ColumnType::Guid), DType::Uuid);
        assert_eq!(dtype_of(ColumnType::Datetime2), DType::DateTime);
    }
}
