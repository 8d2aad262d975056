//! Object storage abstraction

use crate::domain::StorageError;
use async_trait::async_trait;
use bytes::Bytes;

/// Read-only access to objects by key
///
/// Implementations translate their client's failures into
/// [`StorageError::NotFound`] (no object under the key) or
/// [`StorageError::Request`] (anything that may succeed on retry).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches the full payload stored under `key`
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Whether an object exists under `key`
    async fn object_exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Human-readable location for logs, e.g. `s3://flatfiles@https://files.polygon.io`
    fn describe(&self) -> String;
}
