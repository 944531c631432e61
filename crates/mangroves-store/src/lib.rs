//! # mangroves-store
//!
//! Where outputs go. [`ObjectStore`] is implemented by:
//! - [`LocalStore`]: files under a root directory
//! - [`S3Store`]: an S3 bucket, with requests signed by AWS Signature V4
//!   using credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`
//!   and `AWS_SESSION_TOKEN`

mod error;
mod local;
mod s3;
pub mod sigv4;

pub use error::StoreError;
pub use local::LocalStore;
pub use s3::S3Store;
pub use sigv4::Credentials;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Key/value object storage.
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists. Only "not found" maps to `false`.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Read an object. Missing objects are [`StoreError::NotFound`].
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Write an object, replacing any existing one.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Human-readable location of a key, for logs.
    fn url(&self, key: &str) -> String;

    /// Root that keys are joined to when building STAC hrefs.
    fn href_root(&self) -> String;
}

/// Read an object, treating a missing one as `None`.
pub fn get_optional(store: &dyn ObjectStore, key: &str) -> Result<Option<Vec<u8>>> {
    match store.get(key) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
