use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use stats_core::error::StatsError;
use stats_core::settings::Settings;
use stats_runtime::auth::{ServiceAccountKey, TokenSource};
use stats_runtime::storage::gcs::{default_http_client, GcsStorageClient};
use stats_runtime::storage::local::LocalStorageClient;
use stats_runtime::StorageClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.playstats/` exists (home of the last-used parameters).
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(home.join(".playstats"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` value to an [`EnvFilter`] directive.
fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "warn",
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Logs go to stderr, or are appended to `log_file` when one is given, so
/// stdout only ever carries the JSON result.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (stderr_layer, file_layer) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file));
            (None, Some(layer))
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            (Some(layer), None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

// ── Storage bootstrap ──────────────────────────────────────────────────────────

/// Build the storage client described by `settings`.
///
/// `--local-root` selects a filesystem mirror. Otherwise Cloud Storage is
/// used, authenticated with `--access-token` if given, else with the
/// service-account key file.
pub fn build_storage(settings: &Settings) -> stats_core::error::Result<Arc<dyn StorageClient>> {
    if let Some(root) = &settings.local_root {
        tracing::info!(root = %root.display(), "using local storage mirror");
        return Ok(Arc::new(LocalStorageClient::new(root)));
    }

    let http = default_http_client()
        .map_err(|e| StatsError::Config(format!("cannot build HTTP client: {e}")))?;
    let tokens = token_source(settings, &http)?;

    let client = GcsStorageClient::new(http, tokens).with_quota_project(settings.project_id.clone());
    Ok(Arc::new(client))
}

fn token_source(
    settings: &Settings,
    http: &reqwest::Client,
) -> stats_core::error::Result<TokenSource> {
    if let Some(token) = settings.access_token.as_deref().map(str::trim) {
        if !token.is_empty() {
            return Ok(TokenSource::from_static(token));
        }
    }

    match &settings.key {
        Some(path) => {
            let key = ServiceAccountKey::from_file(expand_home(path).as_path())?;
            tracing::debug!(client_email = %key.client_email, "loaded service account key");
            Ok(TokenSource::service_account(key, http.clone()))
        }
        None => Err(StatsError::Config(
            "credentials are required: pass a service account key (-k) or --access-token"
                .to_string(),
        )),
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["playstats"];
        argv.extend_from_slice(args);
        Settings::parse_from(argv)
    }

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        // Override HOME so that dirs::home_dir() resolves to our temp dir.
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let result = ensure_directories();

        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        result.expect("ensure_directories should succeed");
        assert!(tmp.path().join(".playstats").is_dir());
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("info"), "info");
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("ERROR"), "error");
        assert_eq!(filter_directive("verbose"), "warn");
    }

    #[test]
    fn test_build_storage_local_root() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().to_string_lossy().to_string();
        assert!(build_storage(&settings(&["--local-root", &root])).is_ok());
    }

    #[test]
    fn test_build_storage_with_access_token() {
        assert!(build_storage(&settings(&["--access-token", "ya29.token"])).is_ok());
    }

    #[test]
    fn test_build_storage_without_credentials() {
        let mut s = settings(&[]);
        s.access_token = None;
        s.key = None;
        s.local_root = None;
        match build_storage(&s) {
            Err(StatsError::Config(msg)) => assert!(msg.contains("-k")),
            other => panic!("expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_storage_missing_key_file() {
        let tmp = TempDir::new().expect("tempdir");
        let key = tmp.path().join("missing.json").to_string_lossy().to_string();
        let mut s = settings(&["-k", &key]);
        s.access_token = None;
        s.local_root = None;
        assert!(matches!(
            build_storage(&s).map(|_| ()),
            Err(StatsError::Authentication(_))
        ));
    }

    #[test]
    fn test_expand_home_leaves_other_paths() {
        assert_eq!(expand_home(Path::new("/etc/key.json")), PathBuf::from("/etc/key.json"));
        assert_eq!(expand_home(Path::new("key.json")), PathBuf::from("key.json"));
    }
}
