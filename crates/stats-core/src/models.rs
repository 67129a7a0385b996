use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default statistics category used to build the listing prefix.
pub const DEFAULT_REPORT_TYPE: &str = "installs";

/// A named slice of the reporting data; selects the report file suffix.
///
/// The known variants are the dimensions Google Play exports for the
/// statistics reports. Anything else is carried verbatim in [`Dimension::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    #[default]
    Overview,
    AppVersion,
    Carrier,
    Country,
    Device,
    Language,
    OsVersion,
    Other(String),
}

impl Dimension {
    /// The name as it appears in report file names, e.g. `os_version`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Overview => "overview",
            Self::AppVersion => "app_version",
            Self::Carrier => "carrier",
            Self::Country => "country",
            Self::Device => "device",
            Self::Language => "language",
            Self::OsVersion => "os_version",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "overview" => Self::Overview,
            "app_version" => Self::AppVersion,
            "carrier" => Self::Carrier,
            "country" => Self::Country,
            "device" => Self::Device,
            "language" => Self::Language,
            "os_version" => Self::OsVersion,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

impl Serialize for Dimension {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// What a run should fetch: the report category, the app, and the dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub report_type: String,
    pub package_name: String,
    pub dimension: Dimension,
}

impl SelectionCriteria {
    /// Criteria for `package_name` with the default report type and dimension.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            report_type: DEFAULT_REPORT_TYPE.to_string(),
            package_name: package_name.into(),
            dimension: Dimension::Overview,
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.report_type = report_type.into();
        self
    }
}

/// A report object as returned by the remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReportFile {
    /// Full slash-delimited object key.
    pub remote_key: String,
    pub package_name: String,
    pub report_type: String,
    /// Dimension parsed from the key, when the key has the usual shape.
    pub dimension: Option<String>,
}

/// A report file that has been fully downloaded to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileHandle {
    pub remote_key: String,
    pub local_path: PathBuf,
}

/// Counters accumulated over every row of one report file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerFileAggregate {
    pub total_install_count_by_user: u64,
    pub total_uninstall_count_by_user: u64,
    pub total_install_events_detected: u64,
    pub total_uninstall_events_detected: u64,
}

impl PerFileAggregate {
    /// Fieldwise saturating sum of two aggregates.
    pub fn combine(self, other: Self) -> Self {
        Self {
            total_install_count_by_user: self
                .total_install_count_by_user
                .saturating_add(other.total_install_count_by_user),
            total_uninstall_count_by_user: self
                .total_uninstall_count_by_user
                .saturating_add(other.total_uninstall_count_by_user),
            total_install_events_detected: self
                .total_install_events_detected
                .saturating_add(other.total_install_events_detected),
            total_uninstall_events_detected: self
                .total_uninstall_events_detected
                .saturating_add(other.total_uninstall_events_detected),
        }
    }
}

/// Final output of a summary run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Active-device snapshot from the last selected report file.
    pub currently_active_devices: u64,
    pub total_install_count_by_user: u64,
    pub total_uninstall_count_by_user: u64,
    pub total_install_events_detected: u64,
    pub total_uninstall_events_detected: u64,
}

impl Summary {
    pub fn from_totals(totals: PerFileAggregate, currently_active_devices: u64) -> Self {
        Self {
            currently_active_devices,
            total_install_count_by_user: totals.total_install_count_by_user,
            total_uninstall_count_by_user: totals.total_uninstall_count_by_user,
            total_install_events_detected: totals.total_install_events_detected,
            total_uninstall_events_detected: totals.total_uninstall_events_detected,
        }
    }
}
