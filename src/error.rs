use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by connection, read and write operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid arguments or option combinations. Raised before any SQL is sent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Payload columns cannot be mapped onto the destination table.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Failure reported by SQL Server or the TDS driver.
    #[error("Driver error: {0}")]
    Driver(String),

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    pub fn driver(msg: impl Into<String>) -> Self {
        Error::Driver(msg.into())
    }
}

impl From<tiberius::error::Error> for Error {
    fn from(e: tiberius::error::Error) -> Self {
        Error::Driver(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_and_message() {
        let err = Error::config("upsert requires conflict columns");
        assert_eq!(
            err.to_string(),
            "Configuration error: upsert requires conflict columns"
        );

        let err = Error::schema("column 'c3' not found in table");
        assert!(err.to_string().starts_with("Schema mismatch:"));

        let err = Error::driver("Invalid object name 'dbo.missing'");
        assert!(err.to_string().contains("Invalid object name"));
    }
}
