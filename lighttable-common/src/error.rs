//! Common error types for Lighttable

use thiserror::Error;

/// Common result type for Lighttable operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error, e.g. the user directory file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists or operation already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Directory listing failed; the cause is logged, not reported
    #[error("Listing failed: {0}")]
    ListingFailed(String),

    /// External encoder (ffmpeg/ffprobe) failure
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
