// Lambda handler configuration
//
// The handler needs exactly one value, the data bucket name. It is read once
// when the function starts and handed to the handler by value.

use crate::env_overrides::{EnvSource, StdEnvSource};
use thiserror::Error;

pub const DATA_BUCKET_ENV: &str = "DATA_BUCKET";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVariable(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaConfig {
    pub data_bucket: String,
}

impl LambdaConfig {
    pub fn new(data_bucket: impl Into<String>) -> Result<Self, ConfigError> {
        let data_bucket = data_bucket.into();
        if data_bucket.trim().is_empty() {
            return Err(ConfigError::MissingVariable(DATA_BUCKET_ENV));
        }
        Ok(Self { data_bucket })
    }

    /// Read the handler configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_source(&StdEnvSource)
    }

    pub fn from_env_source<E: EnvSource>(env: &E) -> Result<Self, ConfigError> {
        let bucket = env
            .get_raw(DATA_BUCKET_ENV)
            .ok_or(ConfigError::MissingVariable(DATA_BUCKET_ENV))?;
        Self::new(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEnv(Option<&'static str>);

    impl EnvSource for FixedEnv {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            if key == DATA_BUCKET_ENV {
                self.0.map(str::to_string)
            } else {
                None
            }
        }
    }

    #[test]
    fn reads_data_bucket() {
        let config = LambdaConfig::from_env_source(&FixedEnv(Some("etl-data"))).unwrap();
        assert_eq!(config.data_bucket, "etl-data");
    }

    #[test]
    fn missing_data_bucket_is_an_error() {
        let err = LambdaConfig::from_env_source(&FixedEnv(None)).unwrap_err();
        assert_eq!(err, ConfigError::MissingVariable("DATA_BUCKET"));
        assert_eq!(
            err.to_string(),
            "required environment variable DATA_BUCKET is not set"
        );
    }

    #[test]
    fn empty_data_bucket_is_an_error() {
        assert!(LambdaConfig::from_env_source(&FixedEnv(Some(""))).is_err());
        assert!(LambdaConfig::new("   ").is_err());
    }
}
