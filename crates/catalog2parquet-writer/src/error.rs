//! Error types for Parquet sink operations.

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Write operation failed
    E005WriteFailure,
    /// E008: Parquet encoding failed
    E008EncodeFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E004InvalidConfig => "E004",
            Self::E005WriteFailure => "E005",
            Self::E008EncodeFailure => "E008",
        }
    }
}

/// Errors that can occur while writing a dataset to its sink
#[derive(Debug, Error)]
pub enum WriterError {
    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed: {message}")]
    WriteFailure { code: &'static str, message: String },

    /// Record batches could not be encoded as Parquet
    #[error("[{code}] Parquet encoding failed: {message}")]
    EncodeFailure { code: &'static str, message: String },
}

impl WriterError {
    /// Create an invalid config error with error code
    pub fn invalid_config(message: String) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E004InvalidConfig.as_str(),
            message,
        }
    }

    /// Create a write failure error with error code
    pub fn write_failure(message: String) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E005WriteFailure.as_str(),
            message,
        }
    }

    /// Create an encode failure error with error code
    pub fn encode_failure(message: String) -> Self {
        Self::EncodeFailure {
            code: ErrorCode::E008EncodeFailure.as_str(),
            message,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { code, .. }
            | Self::WriteFailure { code, .. }
            | Self::EncodeFailure { code, .. } => code,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
