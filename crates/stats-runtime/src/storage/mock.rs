//! In-memory [`StorageClient`] for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use stats_core::error::StorageError;

use super::{RemoteObject, StorageClient, StorageResult};

#[derive(Default)]
pub struct InMemoryStorageClient {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    failing_keys: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    fail_listing: AtomicBool,
    fail_auth: AtomicBool,
    pub auth_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    /// Downloads started and not yet finished or cancelled.
    pub in_flight: AtomicUsize,
}

impl InMemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn fail_download(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn delay_download(&self, key: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn fail_auth(&self) {
        self.fail_auth.store(true, Ordering::SeqCst);
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl StorageClient for InMemoryStorageClient {
    async fn authenticate(&self) -> StorageResult<()> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(StorageError::Unauthorized("invalid_grant".to_string()));
        }
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<RemoteObject>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::Http {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| RemoteObject::new(k.clone()))
            .collect())
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> StorageResult<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.in_flight);

        let delay = self.delays.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(StorageError::Http {
                status: 500,
                message: format!("failed to fetch {key}"),
            });
        }

        let body = self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        tokio::fs::write(destination, body).await?;
        Ok(())
    }
}
