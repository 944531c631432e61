//! Error types for the vector crate.

use thiserror::Error;

/// Errors that can occur when loading or processing vector data.
#[derive(Debug, Error)]
pub enum VectorError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// GeoJSON parse or conversion error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Grid or projection error.
    #[error("Grid error: {0}")]
    Grid(#[from] mangroves_grid::GridError),

    /// HTTP request error when fetching a remote source.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Remote source could not be downloaded.
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// Source URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The document is valid GeoJSON but not a FeatureCollection.
    #[error("Expected a GeoJSON FeatureCollection in {0}")]
    NotAFeatureCollection(String),

    /// CRS member names a CRS that cannot be handled.
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// Download tracker lock was poisoned (a thread panicked while holding the lock).
    #[error("Download tracker lock was poisoned")]
    LockPoisoned,
}
