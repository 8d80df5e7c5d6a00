//! Error types for catalog resolution and dataset reading

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("table '{database}.{table}' not found in catalog")]
    TableNotFound { database: String, table: String },

    #[error("invalid catalog reference: {0}")]
    InvalidReference(String),

    #[error("invalid catalog manifest '{location}': {reason}")]
    InvalidManifest { location: String, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] opendal::Error),

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: ArrowError,
    },

    #[error("failed to read parquet '{path}': {source}")]
    Parquet {
        path: String,
        #[source]
        source: ParquetError,
    },

    #[error("incompatible schemas across source files: {0}")]
    SchemaMerge(ArrowError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
