//! Data layer for playstats.
//!
//! Selects the report files relevant to a run, reads staged report CSVs into
//! per-file counters, and merges those counters into the run summary.

pub mod aggregator;
pub mod reader;
pub mod selector;

pub use stats_core as core;
