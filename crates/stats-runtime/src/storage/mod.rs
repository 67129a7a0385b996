use std::path::Path;

use serde::Deserialize;
use stats_core::error::StorageError;

pub mod gcs;
pub mod local;
#[cfg(test)]
pub mod mock;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteObject {
    pub key: String,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Read-only object storage capability used by the report engine.
#[async_trait::async_trait]
pub trait StorageClient: Send + Sync {
    /// Make sure the client holds usable credentials.
    ///
    /// Called once before the first remote call of a run; clients that need
    /// no credentials keep the default.
    async fn authenticate(&self) -> StorageResult<()> {
        Ok(())
    }

    /// List every object in `bucket` whose key starts with `prefix`, in
    /// lexical key order.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<RemoteObject>>;

    /// Download one object to `destination`, overwriting any existing file.
    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<()>;
}
