//! Report file selection.
//!
//! The remote listing is already narrowed to one package by its prefix; the
//! selector keeps the files of the requested dimension, in listing order.
//! Listings are lexically sorted and keys carry a `YYYYMM` token right before
//! the dimension suffix, so listing order is chronological and the last
//! selected file is the most recent report.

use chrono::NaiveDate;
use stats_core::models::{RemoteReportFile, SelectionCriteria};
use stats_core::naming::{is_relevant, parse_report_name};
use tracing::{debug, warn};

/// Build [`RemoteReportFile`]s from raw listed keys.
///
/// Package and report type come from `criteria` (the listing prefix
/// guarantees them); the dimension is parsed from the key when possible.
pub fn from_listing<I, S>(keys: I, criteria: &SelectionCriteria) -> Vec<RemoteReportFile>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    keys.into_iter()
        .map(|key| {
            let remote_key: String = key.into();
            let dimension = parse_report_name(&remote_key).map(|name| name.dimension);
            if dimension.is_none() {
                warn!(key = %remote_key, "listed key does not follow the report naming scheme");
            }
            RemoteReportFile {
                remote_key,
                package_name: criteria.package_name.clone(),
                report_type: criteria.report_type.clone(),
                dimension,
            }
        })
        .collect()
}

/// Keep the files whose key ends with `_<dimension>.csv`, preserving order.
///
/// An empty result is not an error.
pub fn select(listing: &[RemoteReportFile], criteria: &SelectionCriteria) -> Vec<RemoteReportFile> {
    let selected: Vec<RemoteReportFile> = listing
        .iter()
        .filter(|file| is_relevant(&file.remote_key, &criteria.dimension))
        .cloned()
        .collect();

    debug!(
        listed = listing.len(),
        selected = selected.len(),
        dimension = %criteria.dimension,
        "selected report files"
    );

    selected
}

/// First and last report month covered by `files`, when their names carry one.
pub fn covered_months(files: &[RemoteReportFile]) -> Option<(NaiveDate, NaiveDate)> {
    let mut months = files
        .iter()
        .filter_map(|f| parse_report_name(&f.remote_key))
        .map(|name| name.month);

    let first = months.next()?;
    let (min, max) = months.fold((first, first), |(lo, hi), m| (lo.min(m), hi.max(m)));
    Some((min, max))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use stats_core::models::Dimension;

    fn criteria(dimension: Dimension) -> SelectionCriteria {
        SelectionCriteria::new("com.example.app").with_dimension(dimension)
    }

    fn listing() -> Vec<RemoteReportFile> {
        from_listing(
            [
                "stats/installs/installs_com.example.app_202401_app_version.csv",
                "stats/installs/installs_com.example.app_202401_country.csv",
                "stats/installs/installs_com.example.app_202401_overview.csv",
                "stats/installs/installs_com.example.app_202402_country.csv",
                "stats/installs/installs_com.example.app_202402_overview.csv",
                "stats/installs/installs_com.example.app_202403_overview.csv",
            ],
            &criteria(Dimension::Overview),
        )
    }

    fn keys(files: &[RemoteReportFile]) -> Vec<&str> {
        files.iter().map(|f| f.remote_key.as_str()).collect()
    }

    #[test]
    fn test_from_listing_populates_attributes() {
        let files = listing();
        assert_eq!(files.len(), 6);
        assert_eq!(files[0].package_name, "com.example.app");
        assert_eq!(files[0].report_type, "installs");
        assert_eq!(files[0].dimension.as_deref(), Some("app_version"));
    }

    #[test]
    fn test_from_listing_unparseable_key_has_no_dimension() {
        let files = from_listing(["stats/installs/notes.txt"], &criteria(Dimension::Overview));
        assert!(files[0].dimension.is_none());
    }

    #[test]
    fn test_select_keeps_only_matching_suffix() {
        let selected = select(&listing(), &criteria(Dimension::Overview));
        assert_eq!(
            keys(&selected),
            vec![
                "stats/installs/installs_com.example.app_202401_overview.csv",
                "stats/installs/installs_com.example.app_202402_overview.csv",
                "stats/installs/installs_com.example.app_202403_overview.csv",
            ]
        );

        let countries = select(&listing(), &criteria(Dimension::Country));
        assert_eq!(countries.len(), 2);
        assert!(countries.iter().all(|f| f.remote_key.ends_with("_country.csv")));
    }

    #[test]
    fn test_select_ignores_prefix_for_suffix_match() {
        // A key outside the usual prefix still matches on suffix alone.
        let files = from_listing(
            ["elsewhere/odd_overview.csv", "stats/installs/x_overview.csv.bak"],
            &criteria(Dimension::Overview),
        );
        let selected = select(&files, &criteria(Dimension::Overview));
        assert_eq!(keys(&selected), vec!["elsewhere/odd_overview.csv"]);
    }

    #[test]
    fn test_select_preserves_order_without_sorting() {
        let mut reversed = listing();
        reversed.reverse();

        let forward = select(&listing(), &criteria(Dimension::Overview));
        let backward = select(&reversed, &criteria(Dimension::Overview));

        let mut expected = keys(&forward);
        expected.reverse();
        assert_eq!(keys(&backward), expected);
    }

    #[test]
    fn test_select_empty_is_not_an_error() {
        let selected = select(&listing(), &criteria(Dimension::Carrier));
        assert!(selected.is_empty());
        assert!(select(&[], &criteria(Dimension::Overview)).is_empty());
    }

    #[test]
    fn test_covered_months() {
        let selected = select(&listing(), &criteria(Dimension::Overview));
        let (first, last) = covered_months(&selected).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(covered_months(&[]).is_none());
    }
}
