//! Catalog resolution
//!
//! A [`Catalog`] maps a [`CatalogReference`] to the physical location, format
//! and (optionally) declared schema of a table. [`ManifestCatalog`] is backed
//! by a TOML manifest stored next to the data:
//!
//! ```toml
//! [[tables]]
//! database = "etl_data_catalog"
//! name = "your_table"
//! location = "input/your_table/"
//! format = "json"
//!
//! [[tables.columns]]
//! name = "id"
//! type = "int64"
//! nullable = false
//! ```

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use async_trait::async_trait;
use opendal::Operator;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::model::CatalogReference;

/// Resolves logical table names into physical table definitions
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn resolve(&self, reference: &CatalogReference) -> Result<TableDefinition>;
}

/// Encoding of the files backing a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Newline-delimited JSON objects
    Json,
    /// Comma-separated values with a header row
    Csv,
    Parquet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Int64,
    Float64,
    Boolean,
    Timestamp,
}

impl ColumnType {
    fn data_type(&self) -> DataType {
        match self {
            ColumnType::String => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// Physical description of a catalog table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Object path relative to the storage root. A trailing `/` marks a
    /// directory of data files; anything else is a single object.
    pub location: String,
    pub format: SourceFormat,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn is_directory(&self) -> bool {
        self.location.ends_with('/')
    }

    /// Declared schema, if the catalog carries column definitions
    pub fn declared_schema(&self) -> Option<SchemaRef> {
        if self.columns.is_empty() {
            return None;
        }

        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(&c.name, c.column_type.data_type(), c.nullable))
            .collect();
        Some(Arc::new(Schema::new(fields)))
    }
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    tables: Vec<ManifestTable>,
}

#[derive(Debug, Deserialize)]
struct ManifestTable {
    database: String,
    name: String,
    location: String,
    format: SourceFormat,
    #[serde(default)]
    columns: Vec<ColumnDefinition>,
}

/// Catalog loaded from a TOML manifest
#[derive(Debug, Clone, Default)]
pub struct ManifestCatalog {
    tables: HashMap<(String, String), TableDefinition>,
}

impl ManifestCatalog {
    /// Read and parse the manifest stored at `path`
    pub async fn load(operator: &Operator, path: &str) -> Result<Self> {
        let buffer = operator.read(path).await?;
        let content = String::from_utf8(buffer.to_vec()).map_err(|e| CoreError::InvalidManifest {
            location: path.to_string(),
            reason: e.to_string(),
        })?;

        let catalog = Self::from_toml_str(&content, path)?;
        tracing::debug!(
            "Loaded catalog manifest '{}' with {} tables",
            path,
            catalog.len()
        );
        Ok(catalog)
    }

    /// Parse a manifest; `location` is only used in error messages
    pub fn from_toml_str(content: &str, location: &str) -> Result<Self> {
        let invalid = |reason: String| CoreError::InvalidManifest {
            location: location.to_string(),
            reason,
        };

        let manifest: ManifestFile = toml::from_str(content).map_err(|e| invalid(e.to_string()))?;

        let mut tables = HashMap::with_capacity(manifest.tables.len());
        for table in manifest.tables {
            if table.database.is_empty() || table.name.is_empty() {
                return Err(invalid("table entries need a database and a name".to_string()));
            }
            if table.location.is_empty() {
                return Err(invalid(format!(
                    "table '{}.{}' has an empty location",
                    table.database, table.name
                )));
            }

            let key = (table.database, table.name);
            if tables.contains_key(&key) {
                return Err(invalid(format!(
                    "table '{}.{}' is declared more than once",
                    key.0, key.1
                )));
            }
            tables.insert(
                key,
                TableDefinition {
                    location: table.location,
                    format: table.format,
                    columns: table.columns,
                },
            );
        }

        Ok(Self { tables })
    }

    /// Register a table programmatically
    pub fn with_table(mut self, reference: &CatalogReference, definition: TableDefinition) -> Self {
        self.tables.insert(
            (
                reference.database().to_string(),
                reference.table().to_string(),
            ),
            definition,
        );
        self
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[async_trait]
impl Catalog for ManifestCatalog {
    async fn resolve(&self, reference: &CatalogReference) -> Result<TableDefinition> {
        self.tables
            .get(&(
                reference.database().to_string(),
                reference.table().to_string(),
            ))
            .cloned()
            .ok_or_else(|| CoreError::TableNotFound {
                database: reference.database().to_string(),
                table: reference.table().to_string(),
            })
    }
}

/// Catalog whose manifest lives in storage and is read on each lookup
#[derive(Debug, Clone)]
pub struct StoredCatalog {
    operator: Operator,
    manifest: String,
}

impl StoredCatalog {
    pub fn new(operator: Operator, manifest: impl Into<String>) -> Self {
        Self {
            operator,
            manifest: manifest.into(),
        }
    }

    pub fn manifest(&self) -> &str {
        &self.manifest
    }
}

#[async_trait]
impl Catalog for StoredCatalog {
    async fn resolve(&self, reference: &CatalogReference) -> Result<TableDefinition> {
        ManifestCatalog::load(&self.operator, &self.manifest)
            .await?
            .resolve(reference)
            .await
    }
}
