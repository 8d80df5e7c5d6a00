// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_source_config(&config.source)?;
    validate_sink_config(&config.sink)?;

    if config.reader.batch_size == 0 {
        bail!("reader.batch_size must be greater than 0");
    }

    if config.job.state_prefix.is_empty() {
        bail!("job.state_prefix must not be empty");
    }

    validate_storage_config(&config.storage)?;

    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    if config.database.trim().is_empty() {
        bail!("source.database must not be empty");
    }

    if config.table.trim().is_empty() {
        bail!("source.table must not be empty");
    }

    if config.manifest.is_empty() {
        bail!("source.manifest must not be empty");
    }

    Ok(())
}

fn validate_sink_config(config: &SinkConfig) -> Result<()> {
    if config.prefix.is_empty() {
        bail!("sink.prefix must not be empty");
    }

    if config.row_group_size == 0 {
        bail!("sink.row_group_size must be greater than 0");
    }

    if config.max_rows_per_file == 0 {
        bail!("sink.max_rows_per_file must be greater than 0");
    }

    Ok(())
}

/// Settings that are valid but probably not what the operator meant.
///
/// Returned rather than logged: configuration loads before tracing is set up.
pub fn config_warnings(config: &RuntimeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sink.row_group_size > config.sink.max_rows_per_file {
        warnings.push(format!(
            "sink.row_group_size ({}) exceeds sink.max_rows_per_file ({}); files will hold a single row group",
            config.sink.row_group_size, config.sink.max_rows_per_file
        ));
    }

    warnings
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.bucket.is_empty() {
                bail!("storage.s3.bucket is required for S3 backend");
            }

            if s3.region.is_empty() {
                bail!("storage.s3.region is required for S3 backend");
            }
        }
        StorageBackend::Memory => {}
    }

    Ok(())
}
