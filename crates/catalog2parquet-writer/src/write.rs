//! Core write operations for Parquet output.
//!
//! Writes a dataset as one or more Parquet files under a sink prefix using
//! OpenDAL. Files are split once they reach `max_rows_per_file` rows.

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use catalog2parquet_core::{DatasetHandle, SinkLocation};
use opendal::Operator;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use uuid::Uuid;

use crate::encoding::{writer_properties, ParquetOptions};
use crate::error::{Result, WriterError};

/// A single object written to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: String,
    pub rows: usize,
    pub bytes: usize,
}

/// Outcome of writing one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub files: Vec<WrittenFile>,
}

impl WriteSummary {
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes).sum()
    }
}

/// Write `dataset` to `sink`, consuming both.
///
/// An empty dataset produces no files and an empty summary.
pub async fn write_dataset(
    operator: &Operator,
    dataset: DatasetHandle,
    sink: SinkLocation,
    options: &ParquetOptions,
) -> Result<WriteSummary> {
    let (source, schema, batches) = dataset.into_parts();
    let chunks = split_into_files(batches, options.max_rows_per_file);

    if chunks.is_empty() {
        tracing::debug!("No rows to write for {}", source);
        return Ok(WriteSummary::default());
    }

    let props = writer_properties(options, &source);
    let write_id = Uuid::new_v4();
    let mut summary = WriteSummary::default();

    tracing::debug!(
        "Writing {} files for {} under '{}'",
        chunks.len(),
        source,
        sink.prefix()
    );

    for (index, chunk) in chunks.iter().enumerate() {
        let file_path = generate_file_path(&sink, index, &write_id);
        let rows: usize = chunk.iter().map(RecordBatch::num_rows).sum();

        let parquet_bytes = encode_parquet(schema.clone(), chunk, props.clone())?;
        let bytes_written = parquet_bytes.len();

        operator
            .write(&file_path, parquet_bytes)
            .await
            .map_err(|e| {
                WriterError::write_failure(format!(
                    "Failed to write parquet bytes to '{}': {}",
                    file_path, e
                ))
            })?;

        tracing::info!(
            "✓ Wrote {} rows to '{}' ({} bytes)",
            rows,
            file_path,
            bytes_written
        );

        summary.files.push(WrittenFile {
            path: file_path,
            rows,
            bytes: bytes_written,
        });
    }

    Ok(summary)
}

/// Group batches into per-file chunks of at most `max_rows` rows.
///
/// Batches crossing a file boundary are sliced; zero-row batches are dropped.
fn split_into_files(batches: Vec<RecordBatch>, max_rows: usize) -> Vec<Vec<RecordBatch>> {
    let max_rows = max_rows.max(1);
    let mut files = Vec::new();
    let mut current = Vec::new();
    let mut current_rows = 0;

    for batch in batches {
        let mut offset = 0;
        while offset < batch.num_rows() {
            let take = (max_rows - current_rows).min(batch.num_rows() - offset);
            current.push(batch.slice(offset, take));
            current_rows += take;
            offset += take;

            if current_rows == max_rows {
                files.push(std::mem::take(&mut current));
                current_rows = 0;
            }
        }
    }

    if current_rows > 0 {
        files.push(current);
    }
    files
}

fn encode_parquet(
    schema: SchemaRef,
    batches: &[RecordBatch],
    props: WriterProperties,
) -> Result<Vec<u8>> {
    let mut writer = ArrowWriter::try_new(Vec::new(), schema, Some(props)).map_err(|e| {
        WriterError::encode_failure(format!("Failed to create Parquet writer: {}", e))
    })?;

    for batch in batches {
        writer.write(batch).map_err(|e| {
            WriterError::encode_failure(format!("Failed to encode record batch: {}", e))
        })?;
    }

    writer
        .into_inner()
        .map_err(|e| WriterError::encode_failure(format!("Failed to finish Parquet file: {}", e)))
}

fn generate_file_path(sink: &SinkLocation, index: usize, write_id: &Uuid) -> String {
    format!(
        "{}part-{:05}-{}.{}",
        sink.prefix(),
        index,
        write_id,
        sink.format().extension()
    )
}
