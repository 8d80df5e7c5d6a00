//! Storage operator construction.

use catalog2parquet_config::{StorageBackend, StorageConfig};
use opendal::Operator;

use crate::error::{Result, WriterError};

/// Build an OpenDAL operator for the configured backend.
///
/// The S3 prefix, when set, becomes the operator root so every path used by
/// the catalog, reader and sink is relative to it.
pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
    let operator = match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                WriterError::invalid_config("fs config required for filesystem backend".to_string())
            })?;

            let fs_builder = opendal::services::Fs::default().root(&fs.path);
            Operator::new(fs_builder)
                .map_err(|e| {
                    WriterError::write_failure(format!(
                        "Failed to create filesystem operator: {}",
                        e
                    ))
                })?
                .finish()
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                WriterError::invalid_config("s3 config required for S3 backend".to_string())
            })?;

            let mut s3_builder = opendal::services::S3::default()
                .bucket(&s3.bucket)
                .region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                s3_builder = s3_builder.endpoint(endpoint);
            }

            if let Some(prefix) = &s3.prefix {
                s3_builder = s3_builder.root(&format!("/{}", prefix.trim_start_matches('/')));
            }

            Operator::new(s3_builder)
                .map_err(|e| {
                    WriterError::write_failure(format!("Failed to create S3 operator: {}", e))
                })?
                .finish()
        }
        StorageBackend::Memory => Operator::new(opendal::services::Memory::default())
            .map_err(|e| {
                WriterError::write_failure(format!("Failed to create memory operator: {}", e))
            })?
            .finish(),
    };

    tracing::debug!("Storage operator initialized ({})", config.backend);
    Ok(operator)
}
