mod bootstrap;

use anyhow::{Context, Result};
use stats_core::settings::Settings;
use stats_runtime::ReportEngine;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("playstats v{} starting", env!("CARGO_PKG_VERSION"));

    let criteria = settings.criteria()?;
    let bucket = settings.bucket()?;
    tracing::info!(
        "Package: {}, Report type: {}, Dimension: {}",
        criteria.package_name,
        criteria.report_type,
        criteria.dimension
    );

    let storage = bootstrap::build_storage(&settings)?;
    let engine = ReportEngine::new(storage, bucket).with_staging_base(&settings.staging_dir);

    let output = match &settings.download_only {
        Some(target) => {
            let handles = engine
                .download_only(&criteria, target)
                .await
                .with_context(|| format!("downloading reports for {}", criteria.package_name))?;
            serde_json::to_string_pretty(&handles)?
        }
        None => {
            let summary = engine
                .compute_summary(&criteria)
                .await
                .with_context(|| format!("summarising reports for {}", criteria.package_name))?;
            serde_json::to_string_pretty(&summary)?
        }
    };

    println!("{output}");
    Ok(())
}
