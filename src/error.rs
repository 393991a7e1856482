//! Error types for energy-broker.

use thiserror::Error as ThisError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by energy-broker components.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A TRON address failed base58check decoding.
    #[error("invalid TRON address: {0}")]
    Address(String),

    /// Outbound HTTP request failed or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// The resource market rejected a request.
    #[error("market error: {0}")]
    Market(String),

    /// Invoice store failure, including rejected status transitions.
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization failure at a storage or API boundary.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
