//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur when reading or writing objects.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error on a local store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The object does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The service answered with an unexpected status.
    #[error("{method} {key} returned HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP method.
        method: String,
        /// Object key.
        key: String,
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// Credentials are missing from the environment.
    #[error("Missing AWS credentials: {0} not set")]
    MissingCredentials(String),

    /// Key escapes the store root or is empty.
    #[error("Invalid object key: '{0}'")]
    InvalidKey(String),
}
