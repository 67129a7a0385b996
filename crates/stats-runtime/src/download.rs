//! Concurrent download of selected report files.

use std::path::Path;
use std::sync::Arc;

use stats_core::error::{Result, StatsError};
use stats_core::models::{LocalFileHandle, RemoteReportFile};
use stats_core::naming::local_file_name;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::storage::StorageClient;

/// Download every file in `selected` into `destination`, all at once.
///
/// The returned handles are in the order of `selected`, whatever order the
/// downloads finish in. The first failure aborts the remaining downloads,
/// waits for them to stop, and is returned as [`StatsError::Download`].
pub async fn download_all(
    storage: Arc<dyn StorageClient>,
    bucket: &str,
    selected: &[RemoteReportFile],
    destination: &Path,
) -> Result<Vec<LocalFileHandle>> {
    let mut tasks = JoinSet::new();
    for (index, file) in selected.iter().enumerate() {
        let storage = Arc::clone(&storage);
        let bucket = bucket.to_string();
        let remote_key = file.remote_key.clone();
        let local_path = destination.join(local_file_name(&remote_key));

        tasks.spawn(async move {
            let outcome = storage
                .download_object(&bucket, &remote_key, &local_path)
                .await;
            (index, LocalFileHandle { remote_key, local_path }, outcome)
        });
    }

    let mut handles: Vec<Option<LocalFileHandle>> = vec![None; selected.len()];
    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok((index, handle, Ok(()))) => {
                debug!(key = %handle.remote_key, "staged");
                handles[index] = Some(handle);
                continue;
            }
            Ok((_, handle, Err(source))) => {
                warn!(key = %handle.remote_key, "download failed: {source}");
                StatsError::Download {
                    key: handle.remote_key,
                    source,
                }
            }
            Err(e) => StatsError::Other(e.into()),
        };
        abort_and_drain(&mut tasks).await;
        return Err(failure);
    }

    Ok(handles.into_iter().flatten().collect())
}

/// Cancel every task still in `tasks` and wait until each has stopped, so
/// no download keeps writing after the caller moves on.
pub(crate) async fn abort_and_drain<T: 'static>(tasks: &mut JoinSet<T>) {
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}
