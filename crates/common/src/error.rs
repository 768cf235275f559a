//! Common error types for Hostlink Rust components.

use std::fmt;

/// A specialized Result type for Hostlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Hostlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Status store error: {0}")]
    Store(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new status store error.
    pub fn store(msg: impl fmt::Display) -> Self {
        Error::Store(msg.to_string())
    }

    /// Create a new registry error.
    pub fn registry(msg: impl fmt::Display) -> Self {
        Error::Registry(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}
