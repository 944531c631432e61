//! Error types for the STAC crate.

use thiserror::Error;

/// Errors that can occur when naming outputs, searching or building items.
#[derive(Debug, Error)]
pub enum StacError {
    /// HTTP transport error.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("STAC request to {url} returned HTTP {status}: {body}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Datetime string could not be understood.
    #[error("Invalid datetime '{0}': expected YYYY, YYYY/YYYY, a date or an RFC 3339 interval")]
    InvalidDatetime(String),

    /// Search returned no items.
    #[error("No items found in collections {collections:?} for datetime {datetime}")]
    EmptyCollection {
        /// Collections searched.
        collections: Vec<String>,
        /// Datetime searched.
        datetime: String,
    },

    /// Grid or projection error.
    #[error("Grid error: {0}")]
    Grid(#[from] mangroves_grid::GridError),
}
