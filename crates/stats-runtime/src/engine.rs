//! Report engine: list, select, stage, read, merge.
//!
//! One [`ReportEngine`] holds a storage client for its whole lifetime and can
//! serve any number of runs. Each summary run stages into a fresh
//! [`StagingSession`] that is torn down before the run returns, on success
//! and on failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stats_core::error::{Result, StatsError};
use stats_core::models::{
    LocalFileHandle, PerFileAggregate, RemoteReportFile, SelectionCriteria, Summary,
};
use stats_core::naming::listing_prefix;
use stats_core::settings::DEFAULT_STAGING_DIR;
use stats_data::aggregator::SummaryMerger;
use stats_data::reader::{self, ReportScan};
use stats_data::selector;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::download::{abort_and_drain, download_all};
use crate::staging::{package_dir, StagingSession};
use crate::storage::StorageClient;

pub struct ReportEngine {
    storage: Arc<dyn StorageClient>,
    bucket: String,
    staging_base: PathBuf,
}

impl ReportEngine {
    pub fn new(storage: Arc<dyn StorageClient>, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            staging_base: PathBuf::from(DEFAULT_STAGING_DIR),
        }
    }

    #[must_use]
    pub fn with_staging_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.staging_base = base.into();
        self
    }

    /// Every report file under the package's listing prefix, in listing order.
    pub async fn list(&self, criteria: &SelectionCriteria) -> Result<Vec<RemoteReportFile>> {
        self.storage
            .authenticate()
            .await
            .map_err(|e| StatsError::Authentication(e.to_string()))?;

        let prefix = listing_prefix(&criteria.report_type, &criteria.package_name);
        let objects = self
            .storage
            .list_objects(&self.bucket, &prefix)
            .await
            .map_err(|source| StatsError::Listing {
                prefix: prefix.clone(),
                source,
            })?;

        debug!(bucket = %self.bucket, %prefix, count = objects.len(), "listing complete");
        Ok(selector::from_listing(
            objects.into_iter().map(|o| o.key),
            criteria,
        ))
    }

    /// The report files of the requested dimension, in listing order.
    pub async fn selected(&self, criteria: &SelectionCriteria) -> Result<Vec<RemoteReportFile>> {
        let listing = self.list(criteria).await?;
        let selected = selector::select(&listing, criteria);
        if let Some((first, last)) = selector::covered_months(&selected) {
            info!(
                files = selected.len(),
                from = %first.format("%Y-%m"),
                to = %last.format("%Y-%m"),
                "selected report files"
            );
        }
        Ok(selected)
    }

    /// Summarise every selected report file of `criteria`.
    ///
    /// Fails with [`StatsError::NoFilesSelected`] when no file matches.
    pub async fn compute_summary(&self, criteria: &SelectionCriteria) -> Result<Summary> {
        let selected = self.selected(criteria).await?;

        let session = StagingSession::create(&self.staging_base);
        let outcome = self.summarise_in(&session, criteria, &selected).await;

        match (outcome, session.teardown().await) {
            (Ok(summary), Ok(())) => {
                info!(
                    package = %criteria.package_name,
                    active_devices = summary.currently_active_devices,
                    installs = summary.total_install_count_by_user,
                    "summary complete"
                );
                Ok(summary)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), teardown) => {
                if let Err(te) = teardown {
                    warn!("staging teardown after failed run also failed: {te}");
                }
                Err(e)
            }
        }
    }

    /// Download the selected report files into `<target>/<package>/` and
    /// keep them there.
    pub async fn download_only(
        &self,
        criteria: &SelectionCriteria,
        target: &Path,
    ) -> Result<Vec<LocalFileHandle>> {
        let selected = self.selected(criteria).await?;
        let dir = package_dir(target, &criteria.package_name).await?;
        let handles = download_all(Arc::clone(&self.storage), &self.bucket, &selected, &dir).await?;
        info!(files = handles.len(), dir = %dir.display(), "downloaded report files");
        Ok(handles)
    }

    async fn summarise_in(
        &self,
        session: &StagingSession,
        criteria: &SelectionCriteria,
        selected: &[RemoteReportFile],
    ) -> Result<Summary> {
        let dir = session.ensure(&criteria.package_name).await?;
        let handles = download_all(Arc::clone(&self.storage), &self.bucket, selected, &dir).await?;

        let scans = scan_all(&handles).await?;
        let aggregates: Vec<PerFileAggregate> = scans.iter().map(|scan| scan.aggregate).collect();
        let active_devices = scans.last().map_or(0, |scan| scan.active_devices);

        SummaryMerger::merge(&aggregates, active_devices, criteria)
    }
}

/// Scan every staged file once, concurrently; results follow `handles` order.
///
/// On the first failure the remaining scan tasks are aborted and drained
/// before the error is returned.
async fn scan_all(handles: &[LocalFileHandle]) -> Result<Vec<ReportScan>> {
    let mut tasks = JoinSet::new();
    for (index, handle) in handles.iter().enumerate() {
        let path = handle.local_path.clone();
        tasks.spawn(async move { (index, reader::scan_file(&path).await) });
    }

    let mut scans = vec![ReportScan::default(); handles.len()];
    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok((index, Ok(scan))) => {
                scans[index] = scan;
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(e) => StatsError::Other(e.into()),
        };
        abort_and_drain(&mut tasks).await;
        return Err(failure);
    }

    Ok(scans)
}
