//! Merging per-file aggregates into a run [`Summary`].

use stats_core::error::{Result, StatsError};
use stats_core::models::{PerFileAggregate, SelectionCriteria, Summary};
use stats_core::naming::listing_prefix;

// ── SummaryMerger ─────────────────────────────────────────────────────────────

/// Stateless helper that folds per-file counters into one summary.
pub struct SummaryMerger;

impl SummaryMerger {
    /// Fieldwise sum of `aggregates`. Order does not matter; an empty slice
    /// sums to zero.
    pub fn sum_aggregates(aggregates: &[PerFileAggregate]) -> PerFileAggregate {
        aggregates
            .iter()
            .fold(PerFileAggregate::default(), |acc, a| acc.combine(*a))
    }

    /// Build the run summary.
    ///
    /// `active_devices` is the snapshot read from the last selected file and
    /// is used verbatim. Fails with [`StatsError::NoFilesSelected`] when there
    /// is nothing to merge, because there is then no last file to take the
    /// snapshot from.
    pub fn merge(
        aggregates: &[PerFileAggregate],
        active_devices: u64,
        criteria: &SelectionCriteria,
    ) -> Result<Summary> {
        if aggregates.is_empty() {
            return Err(no_files_selected(criteria));
        }

        Ok(Summary::from_totals(
            Self::sum_aggregates(aggregates),
            active_devices,
        ))
    }
}

/// The error raised when a run needs a designated last file but has none.
pub fn no_files_selected(criteria: &SelectionCriteria) -> StatsError {
    StatsError::NoFilesSelected {
        prefix: listing_prefix(&criteria.report_type, &criteria.package_name),
        dimension: criteria.dimension.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(installs: u64, uninstalls: u64, events: u64, uninstall_events: u64) -> PerFileAggregate {
        PerFileAggregate {
            total_install_count_by_user: installs,
            total_uninstall_count_by_user: uninstalls,
            total_install_events_detected: events,
            total_uninstall_events_detected: uninstall_events,
        }
    }

    fn criteria() -> SelectionCriteria {
        SelectionCriteria::new("com.example.app")
    }

    #[test]
    fn test_merge_two_files() {
        let a = agg(10, 3, 12, 4);
        let b = agg(7, 2, 9, 1);

        let summary = SummaryMerger::merge(&[a, b], 88, &criteria()).unwrap();

        assert_eq!(
            summary,
            Summary {
                currently_active_devices: 88,
                total_install_count_by_user: 17,
                total_uninstall_count_by_user: 5,
                total_install_events_detected: 21,
                total_uninstall_events_detected: 5,
            }
        );
    }

    #[test]
    fn test_merge_is_order_independent() {
        let parts = [agg(1, 2, 3, 4), agg(10, 20, 30, 40), agg(5, 0, 5, 0)];
        let mut shuffled = parts;
        shuffled.rotate_left(1);
        let mut reversed = parts;
        reversed.reverse();

        let base = SummaryMerger::merge(&parts, 7, &criteria()).unwrap();
        assert_eq!(SummaryMerger::merge(&shuffled, 7, &criteria()).unwrap(), base);
        assert_eq!(SummaryMerger::merge(&reversed, 7, &criteria()).unwrap(), base);
    }

    #[test]
    fn test_sum_is_associative() {
        let (a, b, c) = (agg(1, 2, 3, 4), agg(5, 6, 7, 8), agg(9, 10, 11, 12));
        let left = SummaryMerger::sum_aggregates(&[SummaryMerger::sum_aggregates(&[a, b]), c]);
        let right = SummaryMerger::sum_aggregates(&[a, SummaryMerger::sum_aggregates(&[b, c])]);
        assert_eq!(left, right);
    }

    #[test]
    fn test_active_devices_taken_verbatim() {
        let summary = SummaryMerger::merge(&[agg(1, 1, 1, 1)], 0, &criteria()).unwrap();
        assert_eq!(summary.currently_active_devices, 0);

        let summary = SummaryMerger::merge(&[agg(1, 1, 1, 1)], 12345, &criteria()).unwrap();
        assert_eq!(summary.currently_active_devices, 12345);
    }

    #[test]
    fn test_sum_empty_is_zero() {
        assert_eq!(SummaryMerger::sum_aggregates(&[]), PerFileAggregate::default());
    }

    #[test]
    fn test_merge_empty_is_no_files_selected() {
        match SummaryMerger::merge(&[], 0, &criteria()) {
            Err(StatsError::NoFilesSelected { prefix, dimension }) => {
                assert_eq!(prefix, "stats/installs/installs_com.example.app_");
                assert_eq!(dimension, "overview");
            }
            other => panic!("expected NoFilesSelected, got {other:?}"),
        }
    }
}
