// Configuration source loading.
//
// Priority order:
// 1. Environment variables (CATALOG2PARQUET_* prefix, plus DATA_BUCKET/AWS_REGION)
// 2. Config file path from CATALOG2PARQUET_CONFIG
// 3. Default config files (./config.toml, ./.catalog2parquet.toml)
// 4. Built-in defaults

use crate::env_overrides::{apply_env_overrides, StdEnvSource};
use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_FILES: [&str; 2] = ["./config.toml", "./.catalog2parquet.toml"];

/// Load configuration using the process environment and default file locations.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = match load_from_file()? {
        Some(file_config) => file_config,
        None => RuntimeConfig::default(),
    };

    apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var("CATALOG2PARQUET_CONFIG") {
        return read_config_file(Path::new(&path)).map(Some);
    }

    for path in DEFAULT_CONFIG_FILES {
        let path = Path::new(path);
        if path.exists() {
            tracing::debug!("Using config file {}", path.display());
            return read_config_file(path).map(Some);
        }
    }

    Ok(None)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let mut config = read_config_file(path.as_ref())?;
    apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: RuntimeConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
