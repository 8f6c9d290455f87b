//! Error types for Toolgate operations
//!
//! These cover the library surface (configuration, registration, I/O).
//! Failures of an individual invocation are never raised as Rust errors; they
//! travel inside [`InvocationResult`](crate::capability::InvocationResult).

use crate::registry::RegistryError;

/// Result type for Toolgate operations
pub type Result<T> = std::result::Result<T, ToolgateError>;

/// Error types for the Toolgate framework
#[derive(Debug, thiserror::Error)]
pub enum ToolgateError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Registry operation failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ToolgateError {
    fn from(s: String) -> Self {
        ToolgateError::Other(s)
    }
}

impl From<&str> for ToolgateError {
    fn from(s: &str) -> Self {
        ToolgateError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ToolgateError {
    fn from(err: anyhow::Error) -> Self {
        ToolgateError::Other(err.to_string())
    }
}
