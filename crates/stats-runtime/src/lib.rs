//! Runtime layer for playstats.
//!
//! Storage access (Cloud Storage or a local mirror), credentials, per-run
//! staging, concurrent downloads and the [`engine::ReportEngine`] that ties
//! them to the data layer.

pub mod auth;
pub mod download;
pub mod engine;
pub mod staging;
pub mod storage;

pub use engine::ReportEngine;
pub use stats_core as core;
pub use stats_data as data;
pub use storage::{RemoteObject, StorageClient};
