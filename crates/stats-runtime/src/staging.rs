//! Per-run local staging directories.
//!
//! Every run stages its downloads under its own session root,
//! `<base>/<uuid>/<package>/<file>`, so concurrent runs sharing a base never
//! see or delete each other's files. Teardown removes the session root only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use stats_core::error::{Result, StatsError};
use stats_core::naming::local_file_name;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct StagingSession {
    root: PathBuf,
    released: bool,
}

impl StagingSession {
    /// Allocate a session under `base`. Nothing is created on disk until
    /// [`ensure`](Self::ensure) runs.
    pub fn create(base: impl AsRef<Path>) -> Self {
        Self {
            root: base.as_ref().join(Uuid::new_v4().to_string()),
            released: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (if needed) and return the package directory of this session.
    pub async fn ensure(&self, package_name: &str) -> Result<PathBuf> {
        package_dir(&self.root, package_name).await
    }

    /// Where the object `remote_key` is staged for `package_name`.
    pub fn local_path(&self, package_name: &str, remote_key: &str) -> PathBuf {
        self.root
            .join(package_name)
            .join(local_file_name(remote_key))
    }

    /// Delete the session root. Succeeds when it was never created.
    pub async fn teardown(mut self) -> Result<()> {
        self.released = true;
        remove_dir_if_exists(&self.root).await
    }
}

impl Drop for StagingSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(path = %self.root.display(), "removed abandoned staging session"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), "failed to remove staging session: {e}"),
        }
    }
}

/// Create `<parent>/<package_name>` and return it.
///
/// Package names are used as a single path segment, so separators and
/// relative components are rejected.
pub async fn package_dir(parent: &Path, package_name: &str) -> Result<PathBuf> {
    validate_package_name(package_name)?;
    let dir = parent.join(package_name);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| StatsError::Staging {
            path: dir.clone(),
            source,
        })?;
    Ok(dir)
}

const REMOVE_ATTEMPTS: u32 = 3;
const REMOVE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// `remove_dir_all`, treating an absent directory as already removed.
///
/// A file landing in the tree while it is being removed makes one attempt
/// fail, so removal is retried a few times before giving up.
pub async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    let mut attempt = 1;
    loop {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed staging directory");
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) if attempt < REMOVE_ATTEMPTS => {
                debug!(path = %path.display(), attempt, "retrying staging removal: {e}");
                attempt += 1;
                tokio::time::sleep(REMOVE_RETRY_DELAY).await;
            }
            Err(source) => {
                return Err(StatsError::Staging {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

fn validate_package_name(package_name: &str) -> Result<()> {
    let trimmed = package_name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || package_name.contains(['/', '\\'])
    {
        return Err(StatsError::Config(format!(
            "invalid package name: {package_name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let base = TempDir::new().unwrap();
        let session = StagingSession::create(base.path());

        let first = session.ensure("com.example.app").await.unwrap();
        std::fs::write(first.join("keep.csv"), "x").unwrap();
        let second = session.ensure("com.example.app").await.unwrap();

        assert_eq!(first, second);
        assert!(second.join("keep.csv").exists());
        assert!(first.starts_with(session.root()));
        session.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_local_path_uses_last_segment() {
        let session = StagingSession::create("tempCsvFiles");
        let path = session.local_path(
            "com.example.app",
            "stats/installs/installs_com.example.app_202401_overview.csv",
        );
        assert_eq!(
            path,
            session
                .root()
                .join("com.example.app")
                .join("installs_com.example.app_202401_overview.csv")
        );
        session.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_teardown_removes_only_session_root() {
        let base = TempDir::new().unwrap();
        let other = base.path().join("other-run");
        std::fs::create_dir_all(&other).unwrap();

        let session = StagingSession::create(base.path());
        let dir = session.ensure("pkg").await.unwrap();
        std::fs::write(dir.join("a.csv"), "1").unwrap();
        let root = session.root().to_path_buf();

        session.teardown().await.unwrap();

        assert!(!root.exists());
        assert!(other.exists());
        assert!(base.path().exists());
    }

    #[tokio::test]
    async fn test_teardown_without_ensure_succeeds() {
        let base = TempDir::new().unwrap();
        let session = StagingSession::create(base.path().join("never-created"));
        session.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_cleans_abandoned_session() {
        let base = TempDir::new().unwrap();
        let root = {
            let session = StagingSession::create(base.path());
            session.ensure("pkg").await.unwrap();
            session.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_directory_is_ok() {
        let base = TempDir::new().unwrap();
        remove_dir_if_exists(&base.path().join("missing")).await.unwrap();
    }

    #[tokio::test]
    async fn test_package_dir_rejects_path_like_names() {
        let base = TempDir::new().unwrap();
        for name in ["", " ", "..", "a/b", "a\\b"] {
            assert!(
                matches!(
                    package_dir(base.path(), name).await,
                    Err(StatsError::Config(_))
                ),
                "{name:?} should be rejected"
            );
        }
    }
}
