//! Error taxonomy for export runs, the transport and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A row source could not reach its database or a metadata query failed.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connecting or querying through sqlx failed.
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Schema discovery failed.
    #[error("schema discovery failed: {0}")]
    Discovery(String),

    /// HTTP request to a remote SQL endpoint failed.
    #[error("request to database endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote SQL endpoint rejected a statement.
    #[error("statement failed: {message} (code: {code})")]
    Statement { code: String, message: String },

    /// A result set did not have the expected columns.
    #[error("unexpected result shape: {0}")]
    ResultShape(String),
}

/// A row reached the aggregator without the fields it is required to carry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DataShapeError {
    #[error("row has an empty schema name (table: {table:?})")]
    EmptySchema { table: String },

    #[error("row in schema {schema:?} has an empty table name")]
    EmptyTable { schema: String },

    #[error("row for table {table} has an empty column name")]
    EmptyColumn { table: String },

    #[error("column {table}.{column} references a table with an empty schema or name")]
    EmptyReference { table: String, column: String },
}

/// The modeling service could not be reached or refused a request.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to modeling service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("modeling service answered {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("config has no [{0}] section")]
    MissingSection(&'static str),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    DataShape(#[from] DataShapeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
