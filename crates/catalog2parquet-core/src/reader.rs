//! Dataset reading
//!
//! Loads every data object behind a [`TableDefinition`] into Arrow record
//! batches. Schemas come from the catalog when columns are declared, otherwise
//! they are inferred per file and merged.

use arrow::array::{new_null_array, ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use bytes::Bytes;
use opendal::Operator;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::io::Cursor;
use std::sync::Arc;

use crate::catalog::{SourceFormat, TableDefinition};
use crate::error::{CoreError, Result};
use crate::model::{CatalogReference, DatasetHandle};

/// Reads catalog tables from object storage
#[derive(Clone)]
pub struct DatasetReader {
    operator: Operator,
    batch_size: usize,
}

impl DatasetReader {
    pub fn new(operator: Operator, batch_size: usize) -> Self {
        Self {
            operator,
            batch_size: batch_size.max(1),
        }
    }

    /// Read all records of `table` into a dataset owned by the caller
    pub async fn read(
        &self,
        reference: &CatalogReference,
        table: &TableDefinition,
    ) -> Result<DatasetHandle> {
        let paths = self.data_files(table).await?;
        tracing::debug!(
            "Reading {} {:?} objects for {} from '{}'",
            paths.len(),
            table.format,
            reference,
            table.location
        );

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = self.operator.read(&path).await?.to_bytes();
            files.push((path, bytes));
        }

        let text_format = match table.format {
            SourceFormat::Json => TextFormat::Json,
            SourceFormat::Csv => TextFormat::Csv,
            SourceFormat::Parquet => {
                let (schema, batches) = decode_parquet_files(files, self.batch_size)?;
                return Ok(self.finish(reference, schema, batches));
            }
        };

        let declared = table.declared_schema();
        let mut file_schemas = Vec::with_capacity(files.len());
        for (path, bytes) in &files {
            file_schemas.push(text_file_schema(text_format, declared.as_ref(), path, bytes)?);
        }

        let schema = match declared {
            Some(schema) => schema,
            None => Arc::new(merge_schemas(file_schemas.iter().map(|s| s.as_ref()))?),
        };

        let mut batches = Vec::new();
        for ((path, bytes), file_schema) in files.into_iter().zip(file_schemas) {
            for batch in decode_text_file(text_format, file_schema, &path, bytes, self.batch_size)? {
                batches.push(align_batch(&batch, &schema).map_err(|source| {
                    CoreError::Decode {
                        path: path.clone(),
                        source,
                    }
                })?);
            }
        }

        Ok(self.finish(reference, schema, batches))
    }

    fn finish(
        &self,
        reference: &CatalogReference,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> DatasetHandle {
        let dataset = DatasetHandle::new(reference.clone(), schema, batches);
        tracing::info!(
            "Read {} rows ({} batches) from {}",
            dataset.num_rows(),
            dataset.batches().len(),
            reference
        );
        dataset
    }

    /// Data objects backing a table, in lexical order.
    ///
    /// Directory locations skip hidden objects (`_SUCCESS`, `.crc`,
    /// `_temporary/`, ...).
    async fn data_files(&self, table: &TableDefinition) -> Result<Vec<String>> {
        if !table.is_directory() {
            return Ok(vec![table.location.clone()]);
        }

        let entries = self
            .operator
            .list_with(&table.location)
            .recursive(true)
            .await?;

        let mut paths: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.path().to_string())
            .filter(|path| !path.ends_with('/') && !is_hidden(path, &table.location))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[derive(Debug, Clone, Copy)]
enum TextFormat {
    Json,
    Csv,
}

/// Hidden if any segment below the table location starts with `_` or `.`,
/// which covers `_SUCCESS` markers and `_temporary/` staging directories.
fn is_hidden(path: &str, location: &str) -> bool {
    path.strip_prefix(location)
        .unwrap_or(path)
        .split('/')
        .any(|segment| segment.starts_with('_') || segment.starts_with('.'))
}

/// Schema a single text file is decoded with.
///
/// JSON is decoded by field name, so a declared schema applies as is. CSV is
/// decoded by position, so the file's own header order is kept and declared
/// types are applied to the columns it names.
fn text_file_schema(
    format: TextFormat,
    declared: Option<&SchemaRef>,
    path: &str,
    bytes: &Bytes,
) -> Result<SchemaRef> {
    let decode_err = |source| CoreError::Decode {
        path: path.to_string(),
        source,
    };

    let inferred = match (format, declared) {
        (TextFormat::Json, Some(declared)) => return Ok(declared.clone()),
        (TextFormat::Json, None) => {
            arrow::json::reader::infer_json_schema(Cursor::new(bytes.as_ref()), None)
        }
        (TextFormat::Csv, _) => arrow::csv::reader::Format::default()
            .with_header(true)
            .infer_schema(Cursor::new(bytes.as_ref()), None),
    };
    let (schema, _records) = inferred.map_err(decode_err)?;

    let Some(declared) = declared else {
        return Ok(Arc::new(schema));
    };

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| match declared.field_with_name(field.name()) {
            Ok(declared_field) => declared_field.clone(),
            Err(_) => field.as_ref().clone(),
        })
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

fn decode_text_file(
    format: TextFormat,
    schema: SchemaRef,
    path: &str,
    bytes: Bytes,
    batch_size: usize,
) -> Result<Vec<RecordBatch>> {
    let decode_err = |source| CoreError::Decode {
        path: path.to_string(),
        source,
    };

    match format {
        TextFormat::Json => arrow::json::ReaderBuilder::new(schema)
            .with_batch_size(batch_size)
            .build(Cursor::new(bytes))
            .map_err(decode_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
        TextFormat::Csv => arrow::csv::ReaderBuilder::new(schema)
            .with_header(true)
            .with_batch_size(batch_size)
            .build(Cursor::new(bytes))
            .map_err(decode_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err),
    }
}

fn decode_parquet_files(
    files: Vec<(String, Bytes)>,
    batch_size: usize,
) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let mut schemas = Vec::with_capacity(files.len());
    let mut decoded = Vec::with_capacity(files.len());

    for (path, bytes) in files {
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(bytes).map_err(|source| {
                CoreError::Parquet {
                    path: path.clone(),
                    source,
                }
            })?;
        schemas.push(builder.schema().clone());

        let reader = builder
            .with_batch_size(batch_size)
            .build()
            .map_err(|source| CoreError::Parquet {
                path: path.clone(),
                source,
            })?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|source| CoreError::Decode {
                path: path.clone(),
                source,
            })?;
        decoded.push((path, batches));
    }

    let schema = Arc::new(merge_schemas(schemas.iter().map(|s| s.as_ref()))?);

    let mut batches = Vec::new();
    for (path, file_batches) in decoded {
        for batch in file_batches {
            batches.push(align_batch(&batch, &schema).map_err(|source| {
                CoreError::Decode {
                    path: path.clone(),
                    source,
                }
            })?);
        }
    }

    Ok((schema, batches))
}

/// Merge file schemas by field name, in order of first appearance.
///
/// A field absent from some file becomes nullable. Integer and floating point
/// columns widen to `Float64`; `Null` columns take the other file's type.
fn merge_schemas<'a>(schemas: impl IntoIterator<Item = &'a Schema>) -> Result<Schema> {
    let schemas: Vec<&Schema> = schemas.into_iter().collect();
    let mut fields: Vec<Field> = Vec::new();

    for schema in &schemas {
        for field in schema.fields() {
            match fields.iter_mut().find(|f| f.name() == field.name()) {
                Some(existing) => {
                    let data_type = widen(existing.data_type(), field.data_type())
                        .ok_or_else(|| {
                            CoreError::SchemaMerge(ArrowError::SchemaError(format!(
                                "field '{}' is {} in one file and {} in another",
                                field.name(),
                                existing.data_type(),
                                field.data_type()
                            )))
                        })?;
                    let nullable = existing.is_nullable() || field.is_nullable();
                    *existing = Field::new(field.name(), data_type, nullable);
                }
                None => fields.push(field.as_ref().clone()),
            }
        }
    }

    for field in fields.iter_mut() {
        let everywhere = schemas
            .iter()
            .all(|schema| schema.field_with_name(field.name()).is_ok());
        if !everywhere && !field.is_nullable() {
            *field = field.clone().with_nullable(true);
        }
    }

    Ok(Schema::new(fields))
}

fn widen(left: &DataType, right: &DataType) -> Option<DataType> {
    if left == right {
        return Some(left.clone());
    }
    match (left, right) {
        (DataType::Null, other) | (other, DataType::Null) => Some(other.clone()),
        (l, r) if l.is_integer() && r.is_integer() => Some(DataType::Int64),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(DataType::Float64),
        (DataType::Utf8, _) | (_, DataType::Utf8) => Some(DataType::Utf8),
        _ => None,
    }
}

/// Project `batch` onto `schema` by field name, casting columns whose type
/// differs and filling absent columns with nulls.
fn align_batch(
    batch: &RecordBatch,
    schema: &SchemaRef,
) -> std::result::Result<RecordBatch, ArrowError> {
    let batch_schema = batch.schema();
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let column = match batch_schema.index_of(field.name()) {
            Ok(index) => {
                let column = batch.column(index);
                if column.data_type() == field.data_type() {
                    column.clone()
                } else {
                    cast(column, field.data_type())?
                }
            }
            Err(_) => new_null_array(field.data_type(), batch.num_rows()),
        };
        columns.push(column);
    }

    RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
    )
}
