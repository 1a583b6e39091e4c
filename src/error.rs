use std::path::PathBuf;

use thiserror::Error;

/// Main library error type that encompasses all possible failure modes
///
/// Rule violations found while validating are never errors: they are collected
/// as diagnostics. Only the failures below abort an operation.
#[derive(Error, Debug)]
pub enum DtdError {
    #[error("Invalid input: {details}")]
    InvalidInput { details: String },

    #[error("Invalid input: unknown conversion mode '{mode}' (expected 'normal' or 'strict')")]
    InvalidMode { mode: String },

    #[error("Invalid input: element nesting exceeds the limit of {limit} levels")]
    DepthLimitExceeded { limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },

    #[error("Operation timed out: {path} after {timeout_seconds} seconds")]
    Timeout { path: PathBuf, timeout_seconds: u64 },
}

impl DtdError {
    /// Shorthand for a well-formedness failure reported by the markup parser
    pub fn invalid_input(details: impl Into<String>) -> Self {
        DtdError::InvalidInput {
            details: details.into(),
        }
    }

    /// True for failures caused by the supplied text itself rather than the environment
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            DtdError::InvalidInput { .. }
                | DtdError::InvalidMode { .. }
                | DtdError::DepthLimitExceeded { .. }
        )
    }
}

impl From<crate::config::ConfigError> for DtdError {
    fn from(err: crate::config::ConfigError) -> Self {
        DtdError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DtdError>;
