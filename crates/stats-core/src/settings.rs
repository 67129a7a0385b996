use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, StatsError};
use crate::models::{Dimension, SelectionCriteria, DEFAULT_REPORT_TYPE};

/// Default staging directory, relative to the working directory.
pub const DEFAULT_STAGING_DIR: &str = "tempCsvFiles";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Summarise Google Play install statistics exported to Cloud Storage
#[derive(Parser, Debug, Clone)]
#[command(
    name = "playstats",
    about = "Summarise Google Play install statistics exported to Cloud Storage",
    version
)]
pub struct Settings {
    /// Target app package name
    #[arg(short = 'p', long, env = "PLAYSTATS_PACKAGE_NAME")]
    pub package_name: Option<String>,

    /// Bucket name from Play Console -> Download reports -> Statistics -> Cloud Storage URI
    /// (for gs://pubsite_prod_xxxxxxx/stats/installs/ use "pubsite_prod_xxxxxxx")
    #[arg(short = 'b', long, env = "PLAYSTATS_BUCKET_NAME")]
    pub bucket_name: Option<String>,

    /// Service account key file (JSON)
    #[arg(short = 'k', long, env = "PLAYSTATS_KEY_FILE")]
    pub key: Option<PathBuf>,

    /// Google Cloud project id the service account belongs to
    #[arg(short = 'g', long, env = "PLAYSTATS_PROJECT_ID")]
    pub project_id: Option<String>,

    /// OAuth2 access token to use instead of a service account key
    #[arg(long, env = "PLAYSTATS_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Report dimension (overview, app_version, carrier, country, device, language, os_version)
    #[arg(long, default_value = "overview", env = "PLAYSTATS_DIMENSION")]
    pub dimension: String,

    /// Statistics report type
    #[arg(long, default_value = DEFAULT_REPORT_TYPE, env = "PLAYSTATS_REPORT_TYPE")]
    pub report_type: String,

    /// Download the selected report files into this directory instead of summarising them
    #[arg(long, value_name = "TARGET")]
    pub download_only: Option<PathBuf>,

    /// Directory under which each run stages its downloads
    #[arg(long, default_value = DEFAULT_STAGING_DIR, env = "PLAYSTATS_STAGING_DIR")]
    pub staging_dir: PathBuf,

    /// Read buckets from this local directory instead of Cloud Storage
    #[arg(long, env = "PLAYSTATS_LOCAL_ROOT")]
    pub local_root: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.playstats/last_used.json`.
///
/// The access token is deliberately absent: it is never written to disk.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".playstats").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation. Accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "could not clear saved configuration");
            }
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // Explicit values (command line or environment) always win.
        if settings.package_name.is_none() {
            settings.package_name = last.package_name;
        }
        if settings.bucket_name.is_none() {
            settings.bucket_name = last.bucket_name;
        }
        if settings.key.is_none() {
            settings.key = last.key;
        }
        if settings.project_id.is_none() {
            settings.project_id = last.project_id;
        }
        if !is_arg_explicitly_set(&matches, "dimension") {
            if let Some(v) = last.dimension {
                settings.dimension = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "report_type") {
            if let Some(v) = last.report_type {
                settings.report_type = v;
            }
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        if let Err(e) = params.save_to(config_path) {
            tracing::debug!(error = %e, "could not persist last-used parameters");
        }

        settings
    }

    /// Selection criteria described by these settings.
    pub fn criteria(&self) -> Result<SelectionCriteria> {
        let package_name = self
            .package_name
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StatsError::Config("package name is required (-p)".to_string()))?;

        let dimension: Dimension = self.dimension.parse().unwrap_or_default();

        Ok(SelectionCriteria::new(package_name)
            .with_dimension(dimension)
            .with_report_type(self.report_type.trim()))
    }

    /// The bucket to read from.
    pub fn bucket(&self) -> Result<&str> {
        self.bucket_name
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| StatsError::Config("bucket name is required (-b)".to_string()))
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            package_name: s.package_name.clone(),
            bucket_name: s.bucket_name.clone(),
            key: s.key.clone(),
            project_id: s.project_id.clone(),
            dimension: Some(s.dimension.clone()),
            report_type: Some(s.report_type.clone()),
        }
    }
}

// ── Helper: check if an arg was explicitly set ─────────────────────────────────

/// Returns `true` when `name` was supplied on the command line or through its
/// environment variable (not via default value).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(clap::parser::ValueSource::CommandLine | clap::parser::ValueSource::EnvVariable)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
