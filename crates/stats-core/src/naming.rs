//! Naming rules for Google Play statistics report objects.
//!
//! Reports live under `stats/<reportType>/` and are named
//! `<reportType>_<package>_<YYYYMM>_<dimension>.csv`. The listing prefix
//! narrows the bucket to one app; the dimension suffix picks the files a run
//! actually reads.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::Dimension;

// ── Prefix / suffix ───────────────────────────────────────────────────────────

/// Server-side listing prefix for one report type and package.
///
/// `listing_prefix("installs", "com.example")` → `"stats/installs/installs_com.example_"`.
pub fn listing_prefix(report_type: &str, package_name: &str) -> String {
    format!("stats/{report_type}/{report_type}_{package_name}_")
}

/// File-name suffix carried by every report of `dimension`.
pub fn dimension_suffix(dimension: &Dimension) -> String {
    format!("_{}.csv", dimension.as_str())
}

/// `true` when `key` is a report file for `dimension`.
pub fn is_relevant(key: &str, dimension: &Dimension) -> bool {
    key.ends_with(&dimension_suffix(dimension))
}

/// Final path segment of an object key, used as the local file name.
pub fn local_file_name(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[idx + 1..],
        None => key,
    }
}

// ── Parsed names ──────────────────────────────────────────────────────────────

/// The components encoded in a report file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportName {
    pub report_type: String,
    pub package_name: String,
    /// First day of the month encoded by the `YYYYMM` token.
    pub month: NaiveDate,
    pub dimension: String,
}

fn report_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<rt>[a-z_]+?)_(?P<pkg>.+)_(?P<date>\d{6})_(?P<dim>[A-Za-z0-9_]+)\.csv$")
            .expect("regex is valid")
    })
}

/// Parse the final segment of `key` into its naming components.
///
/// Returns `None` when the segment does not follow the report naming shape
/// or the date token is not a real month.
pub fn parse_report_name(key: &str) -> Option<ReportName> {
    let caps = report_name_regex().captures(local_file_name(key))?;
    let date = &caps["date"];
    let year: i32 = date[..4].parse().ok()?;
    let month: u32 = date[4..].parse().ok()?;

    Some(ReportName {
        report_type: caps["rt"].to_string(),
        package_name: caps["pkg"].to_string(),
        month: NaiveDate::from_ymd_opt(year, month, 1)?,
        dimension: caps["dim"].to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_prefix() {
        assert_eq!(
            listing_prefix("installs", "com.example.app"),
            "stats/installs/installs_com.example.app_"
        );
    }

    #[test]
    fn test_dimension_suffix() {
        assert_eq!(dimension_suffix(&Dimension::Overview), "_overview.csv");
        assert_eq!(dimension_suffix(&Dimension::OsVersion), "_os_version.csv");
    }

    #[test]
    fn test_is_relevant_matches_suffix_only() {
        let key = "stats/installs/installs_com.example_202401_overview.csv";
        assert!(is_relevant(key, &Dimension::Overview));
        assert!(!is_relevant(key, &Dimension::Country));
        // The suffix must include the leading underscore.
        assert!(!is_relevant("stats/installs/installs_com.example_202401overview.csv", &Dimension::Overview));
        assert!(!is_relevant("stats/installs/installs_com.example_202401_overview.csv.gz", &Dimension::Overview));
    }

    #[test]
    fn test_is_relevant_does_not_confuse_version_dimensions() {
        let key = "stats/installs/installs_com.example_202401_app_version.csv";
        assert!(is_relevant(key, &Dimension::AppVersion));
        assert!(!is_relevant(key, &Dimension::OsVersion));
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(
            local_file_name("stats/installs/installs_com.example_202401_overview.csv"),
            "installs_com.example_202401_overview.csv"
        );
        assert_eq!(local_file_name("plain.csv"), "plain.csv");
        assert_eq!(local_file_name("dir/"), "");
    }

    #[test]
    fn test_parse_report_name() {
        let name = parse_report_name("stats/installs/installs_com.example.app_202403_os_version.csv")
            .expect("well-formed name");
        assert_eq!(name.report_type, "installs");
        assert_eq!(name.package_name, "com.example.app");
        assert_eq!(name.month, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(name.dimension, "os_version");
    }

    #[test]
    fn test_parse_report_name_package_with_underscores() {
        let name = parse_report_name("installs_com.my_app.lite_201912_overview.csv").unwrap();
        assert_eq!(name.package_name, "com.my_app.lite");
        assert_eq!(name.month, NaiveDate::from_ymd_opt(2019, 12, 1).unwrap());
    }

    #[test]
    fn test_parse_report_name_rejects_bad_shapes() {
        assert!(parse_report_name("stats/installs/readme.txt").is_none());
        assert!(parse_report_name("installs_com.example_2024_overview.csv").is_none());
        assert!(parse_report_name("installs_com.example_202413_overview.csv").is_none());
    }
}
