// catalog2parquet-config - Configuration for the conversion job and the Lambda handler
//
// The job configuration is assembled from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from CATALOG2PARQUET_CONFIG env var
// 3. Default config file locations (./config.toml, ./.catalog2parquet.toml)
// 4. Built-in defaults (lowest priority)
//
// The Lambda handler only needs DATA_BUCKET and reads it through `LambdaConfig`.

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod env_overrides;
mod lambda;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, StdEnvSource, ENV_PREFIX};
pub use lambda::{ConfigError, LambdaConfig, DATA_BUCKET_ENV};

/// Database the job reads from unless configured otherwise
pub const DEFAULT_SOURCE_DATABASE: &str = "etl_data_catalog";
/// Table the job reads from unless configured otherwise
pub const DEFAULT_SOURCE_TABLE: &str = "your_table";
/// Prefix under the storage root where converted files land
pub const DEFAULT_OUTPUT_PREFIX: &str = "output/";

/// Main runtime configuration for the conversion job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub job: JobConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Which catalog table to convert and where the catalog lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub database: String,
    pub table: String,
    /// Object path of the catalog manifest, relative to the storage root
    #[serde(default = "default_manifest")]
    pub manifest: String,
}

fn default_manifest() -> String {
    "catalog/catalog.toml".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_SOURCE_DATABASE.to_string(),
            table: DEFAULT_SOURCE_TABLE.to_string(),
            manifest: default_manifest(),
        }
    }
}

/// Output location and Parquet encoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_output_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub format: SinkFormat,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
    #[serde(default = "default_max_rows_per_file")]
    pub max_rows_per_file: usize,
}

fn default_output_prefix() -> String {
    DEFAULT_OUTPUT_PREFIX.to_string()
}

fn default_row_group_size() -> usize {
    32 * 1024
}

fn default_max_rows_per_file() -> usize {
    1_000_000
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            prefix: default_output_prefix(),
            format: SinkFormat::default(),
            compression: Compression::default(),
            row_group_size: default_row_group_size(),
            max_rows_per_file: default_max_rows_per_file(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    #[default]
    Parquet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    None,
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            "none" | "uncompressed" => Ok(Compression::None),
            _ => anyhow::bail!("Unsupported compression: {}. Supported: snappy, zstd, none", s),
        }
    }
}

/// Source reading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub batch_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { batch_size: 8192 }
    }
}

/// Job bookkeeping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Prefix for run records written on commit/failure
    pub state_prefix: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            state_prefix: "_job_runs/".to_string(),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            fs: Some(FsConfig::default()),
            s3: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            _ => anyhow::bail!(
                "Unsupported storage backend: {}. Supported: fs, s3, memory",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Optional path prefix applied to every object (e.g., "team-a/")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration starting from an explicit file (CLI --config flag)
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Non-fatal configuration problems, for logging once tracing is up
    pub fn warnings(&self) -> Vec<String> {
        validation::config_warnings(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Fs);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "filesystem".parse::<StorageBackend>().unwrap(),
            StorageBackend::Fs
        );
        assert_eq!("aws".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "MEMORY".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("r2".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.source.database, "etl_data_catalog");
        assert_eq!(config.source.table, "your_table");
        assert_eq!(config.sink.prefix, "output/");
        assert_eq!(config.sink.format, SinkFormat::Parquet);
        assert_eq!(config.sink.compression, Compression::Snappy);
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [source]
            database = "sales"
            table = "orders"

            [storage]
            backend = "s3"

            [storage.s3]
            bucket = "my-data"
            region = "eu-west-1"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.database, "sales");
        assert_eq!(config.source.manifest, "catalog/catalog.toml");
        assert_eq!(config.sink.row_group_size, 32 * 1024);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.s3.as_ref().unwrap().bucket, "my-data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("ZSTD".parse::<Compression>().unwrap(), Compression::Zstd);
        assert_eq!(
            "uncompressed".parse::<Compression>().unwrap(),
            Compression::None
        );
        assert!("lz4".parse::<Compression>().is_err());
    }
}
