//! Report CSV reading for playstats.
//!
//! Report files are read as headerless rows of raw byte fields. Four fixed
//! column positions carry the install/uninstall counters; every cell goes
//! through [`FieldCoercer`], so malformed values count as zero instead of
//! failing the file. Only structural read failures are errors.
//!
//! Play Console writes its exports as UTF-16 with a byte-order mark. Such
//! files are transcoded to UTF-8 before CSV parsing so that quoted cells keep
//! their embedded commas; files without a BOM are parsed byte for byte.

use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use stats_core::data_processors::FieldCoercer;
use stats_core::error::{Result, StatsError};
use stats_core::models::PerFileAggregate;
use tracing::debug;

// ── Column layout ─────────────────────────────────────────────────────────────

/// Total installs by user.
pub const INSTALLS_BY_USER_COLUMN: usize = 6;
/// Total uninstalls by user.
pub const UNINSTALLS_BY_USER_COLUMN: usize = 7;
/// Install events; also the column read for the active-device snapshot.
pub const INSTALL_EVENTS_COLUMN: usize = 8;
/// Uninstall events.
pub const UNINSTALL_EVENTS_COLUMN: usize = 11;
pub const ACTIVE_DEVICES_COLUMN: usize = INSTALL_EVENTS_COLUMN;

// ── ReportScan ────────────────────────────────────────────────────────────────

/// Everything one pass over a report file yields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportScan {
    pub aggregate: PerFileAggregate,
    /// Last non-zero value of the active-device column, or `0`.
    pub active_devices: u64,
    pub rows: u64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Stream the file at `path` once, collecting both the counter sums and the
/// active-device snapshot.
///
/// Fails with [`StatsError::CsvRead`] when the file cannot be opened or read.
pub async fn scan_file(path: &Path) -> Result<ReportScan> {
    let owned = path.to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || -> std::result::Result<_, csv::Error> {
        let file = std::fs::File::open(&owned)?;
        scan_records(BufReader::new(file))
    })
    .await
    .map_err(|e| StatsError::Other(e.into()))?;

    let scan = outcome.map_err(|source| StatsError::CsvRead {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %path.display(),
        rows = scan.rows,
        installs = scan.aggregate.total_install_count_by_user,
        active_devices = scan.active_devices,
        "scanned report file"
    );

    Ok(scan)
}

/// Sum the four counter columns over every row of the file at `path`.
pub async fn aggregate_file(path: &Path) -> Result<PerFileAggregate> {
    scan_file(path).await.map(|scan| scan.aggregate)
}

/// The last non-zero active-device value in the file at `path`, or `0`.
pub async fn active_devices(path: &Path) -> Result<u64> {
    scan_file(path).await.map(|scan| scan.active_devices)
}

/// Single pass over every row readable from `reader`.
///
/// The active-device count is a snapshot, not a running total: later rows
/// replace earlier ones, and zero rows never overwrite a reading.
pub fn scan_records<R: Read>(reader: R) -> std::result::Result<ReportScan, csv::Error> {
    let mut scan = ReportScan::default();

    for record in report_reader(reader).byte_records() {
        let record = record?;
        scan.aggregate = scan.aggregate.combine(aggregate_row(&record));
        let active = FieldCoercer::coerce_opt(record.get(ACTIVE_DEVICES_COLUMN));
        if active != 0 {
            scan.active_devices = active;
        }
        scan.rows += 1;
    }

    Ok(scan)
}

/// Sum the counter columns of every row readable from `reader`.
pub fn aggregate_records<R: Read>(reader: R) -> std::result::Result<PerFileAggregate, csv::Error> {
    scan_records(reader).map(|scan| scan.aggregate)
}

/// Scan the active-device column and keep the last non-zero value.
pub fn active_devices_from_reader<R: Read>(reader: R) -> std::result::Result<u64, csv::Error> {
    scan_records(reader).map(|scan| scan.active_devices)
}

/// Counters carried by a single row. Missing columns count as zero.
pub fn aggregate_row(record: &ByteRecord) -> PerFileAggregate {
    PerFileAggregate {
        total_install_count_by_user: FieldCoercer::coerce_opt(record.get(INSTALLS_BY_USER_COLUMN)),
        total_uninstall_count_by_user: FieldCoercer::coerce_opt(
            record.get(UNINSTALLS_BY_USER_COLUMN),
        ),
        total_install_events_detected: FieldCoercer::coerce_opt(record.get(INSTALL_EVENTS_COLUMN)),
        total_uninstall_events_detected: FieldCoercer::coerce_opt(
            record.get(UNINSTALL_EVENTS_COLUMN),
        ),
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Headerless, ragged-row CSV reader. A UTF-16 BOM switches on transcoding
/// to UTF-8; without one the bytes pass through untouched.
fn report_reader<R: Read>(reader: R) -> csv::Reader<DecodeReaderBytes<R, Vec<u8>>> {
    let decoded = DecodeReaderBytesBuilder::new()
        .bom_sniffing(true)
        .strip_bom(true)
        .build(reader);

    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(decoded)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
