//! Catalog model and dataset reading for catalog2parquet
//!
//! - [`CatalogReference`], [`DatasetHandle`] and [`SinkLocation`] describe what
//!   moves through a conversion job
//! - [`Catalog`] resolves references into [`TableDefinition`]s
//! - [`DatasetReader`] loads a table's objects into Arrow record batches

mod catalog;
mod error;
mod model;
mod reader;

pub use catalog::{
    Catalog, ColumnDefinition, ColumnType, ManifestCatalog, SourceFormat, StoredCatalog,
    TableDefinition,
};
pub use error::{CoreError, Result};
pub use model::{CatalogReference, DatasetHandle, SinkFormat, SinkLocation};
pub use reader::DatasetReader;
