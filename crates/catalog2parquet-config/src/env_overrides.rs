use super::{Compression, FsConfig, LogFormat, RuntimeConfig, S3Config, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "CATALOG2PARQUET_";

/// Abstraction over environment-variable lookups so tests (and runtimes
/// without `std::env`) can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the CATALOG2PARQUET_ prefix
    /// Used for platform variables (DATA_BUCKET, AWS_REGION, ...)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Source table
    if let Some(database) = env.get("SOURCE_DATABASE") {
        config.source.database = database;
    }
    if let Some(table) = env.get("SOURCE_TABLE") {
        config.source.table = table;
    }
    if let Some(manifest) = env.get("CATALOG_MANIFEST") {
        config.source.manifest = manifest;
    }

    // Sink
    if let Some(prefix) = env.get("OUTPUT_PREFIX") {
        config.sink.prefix = normalize_prefix(prefix).unwrap_or_default();
    }
    if let Some(val) = get_env_usize(env, "MAX_ROWS_PER_FILE")? {
        config.sink.max_rows_per_file = val;
    }
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.sink.row_group_size = val;
    }
    if let Some(compression) = env.get("COMPRESSION") {
        config.sink.compression = compression
            .parse::<Compression>()
            .context("Invalid CATALOG2PARQUET_COMPRESSION value")?;
    }

    // Reader / job
    if let Some(val) = get_env_usize(env, "READ_BATCH_SIZE")? {
        config.reader.batch_size = val;
    }
    if let Some(prefix) = env.get("STATE_PREFIX") {
        config.job.state_prefix = normalize_prefix(prefix).unwrap_or_default();
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Storage backend
    if let Some(backend) = env.get("STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid CATALOG2PARQUET_STORAGE_BACKEND value")?;
    }
    if let Some(path) = env.get("STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage; DATA_BUCKET and AWS_REGION are the platform-provided fallbacks
    if let Some(bucket) = env.get("S3_BUCKET").or_else(|| env.get_raw("DATA_BUCKET")) {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(region) = env.get("S3_REGION") {
        ensure_s3(config).region = region;
    } else if let Some(region) = env.get_raw("AWS_REGION") {
        if let Some(s3) = config.storage.s3.as_mut() {
            if s3.region.is_empty() {
                s3.region = region;
            }
        }
    }
    if let Some(endpoint) = env.get("S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(prefix) = env.get("S3_PREFIX") {
        ensure_s3(config).prefix = normalize_prefix(prefix);
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(|| S3Config {
        bucket: String::new(),
        region: String::new(),
        endpoint: None,
        prefix: None,
    })
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn normalize_prefix(prefix: String) -> Option<String> {
    if prefix.is_empty() {
        None
    } else if prefix.ends_with('/') {
        Some(prefix)
    } else {
        Some(format!("{}/", prefix))
    }
}
