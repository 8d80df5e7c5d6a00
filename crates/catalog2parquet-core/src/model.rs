//! Data model shared by the job and the writer

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use std::fmt;

use crate::error::{CoreError, Result};

/// Identifies a logical dataset registered in a catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogReference {
    database: String,
    table: String,
}

impl CatalogReference {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let database = database.into();
        let table = table.into();

        if database.trim().is_empty() {
            return Err(CoreError::InvalidReference(
                "database name must not be empty".to_string(),
            ));
        }
        if table.trim().is_empty() {
            return Err(CoreError::InvalidReference(
                "table name must not be empty".to_string(),
            ));
        }

        Ok(Self { database, table })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for CatalogReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Records read from a catalog table.
///
/// Owned by whoever read it until it is handed to a sink, which consumes it.
#[derive(Debug)]
pub struct DatasetHandle {
    source: CatalogReference,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl DatasetHandle {
    pub fn new(source: CatalogReference, schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            source,
            schema,
            batches,
        }
    }

    pub fn source(&self) -> &CatalogReference {
        &self.source
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn into_parts(self) -> (CatalogReference, SchemaRef, Vec<RecordBatch>) {
        (self.source, self.schema, self.batches)
    }
}

/// Encoding of files written to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFormat {
    Parquet,
}

impl SinkFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SinkFormat::Parquet => "parquet",
        }
    }
}

/// Destination of exactly one dataset write
#[derive(Debug, PartialEq, Eq)]
pub struct SinkLocation {
    prefix: String,
    format: SinkFormat,
}

impl SinkLocation {
    /// Build a sink rooted at `prefix`; a trailing `/` is added when missing.
    pub fn new(prefix: impl Into<String>, format: SinkFormat) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix, format }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn format(&self) -> SinkFormat {
        self.format
    }
}
