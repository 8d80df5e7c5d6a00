use catalog2parquet_config::{Compression as CompressionSetting, SinkConfig};
use catalog2parquet_core::CatalogReference;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

/// Parquet output settings for one write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParquetOptions {
    pub compression: CompressionSetting,
    pub row_group_size: usize,
    /// Upper bound on rows per output file
    pub max_rows_per_file: usize,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self::from(&SinkConfig::default())
    }
}

impl From<&SinkConfig> for ParquetOptions {
    fn from(sink: &SinkConfig) -> Self {
        Self {
            compression: sink.compression,
            row_group_size: sink.row_group_size.max(1),
            max_rows_per_file: sink.max_rows_per_file.max(1),
        }
    }
}

fn compression_setting(setting: CompressionSetting) -> Compression {
    match setting {
        CompressionSetting::Snappy => Compression::SNAPPY,
        CompressionSetting::Zstd => Compression::ZSTD(ZstdLevel::default()),
        CompressionSetting::None => Compression::UNCOMPRESSED,
    }
}

/// Writer properties for files produced from `source`
///
/// - Dictionary encoding enabled
/// - Page level statistics
/// - Writer version and source table embedded in file metadata
pub(crate) fn writer_properties(
    options: &ParquetOptions,
    source: &CatalogReference,
) -> WriterProperties {
    let metadata = vec![
        KeyValue {
            key: "catalog2parquet.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
        KeyValue {
            key: "source.database".to_string(),
            value: Some(source.database().to_string()),
        },
        KeyValue {
            key: "source.table".to_string(),
            value: Some(source.table().to_string()),
        },
    ];

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting(options.compression))
        .set_data_page_size_limit(256 * 1024)
        .set_write_batch_size(options.row_group_size.min(32 * 1024))
        .set_max_row_group_size(options.row_group_size)
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(metadata))
        .build()
}
