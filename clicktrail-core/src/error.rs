//! Error types for clicktrail-core

use thiserror::Error;

/// Main error type for the clicktrail-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Delivery through the request/response transport failed
    #[error("transport error: {0}")]
    Transport(String),

    /// The unload-safe transport could not schedule a send
    #[error("beacon error: {0}")]
    Beacon(String),

    /// Durable client storage error
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type alias for clicktrail-core
pub type Result<T> = std::result::Result<T, Error>;
