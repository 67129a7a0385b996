//! Filesystem-backed storage: `<root>/<bucket>/<key>`.
//!
//! Useful for working against a mirrored copy of a reports bucket
//! (`gsutil -m cp -r gs://bucket/stats <root>/bucket/`).

use std::path::{Component, Path, PathBuf};

use stats_core::error::StorageError;
use tracing::debug;
use walkdir::WalkDir;

use super::{RemoteObject, StorageClient, StorageResult};

#[derive(Debug, Clone)]
pub struct LocalStorageClient {
    root: PathBuf,
}

impl LocalStorageClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Map an object key onto a path under the bucket directory.
    fn object_path(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return None;
        }
        Some(self.bucket_dir(bucket).join(relative))
    }
}

fn key_for(bucket_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_dir).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[async_trait::async_trait]
impl StorageClient for LocalStorageClient {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        let bucket_dir = self.bucket_dir(bucket);
        if !bucket_dir.is_dir() {
            return Err(StorageError::NotFound(format!(
                "bucket directory {}",
                bucket_dir.display()
            )));
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&bucket_dir).follow_links(true) {
            let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = key_for(&bucket_dir, entry.path()) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();

        debug!(bucket, prefix, count = keys.len(), "listed local objects");
        Ok(keys.into_iter().map(RemoteObject::new).collect())
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<()> {
        let source = self
            .object_path(bucket, key)
            .filter(|p| p.is_file())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        tokio::fs::copy(&source, destination).await?;
        Ok(())
    }
}
