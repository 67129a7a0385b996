//! Shared types for playstats.
//!
//! Holds the data model, the report naming scheme, tolerant field coercion,
//! the error taxonomy, and CLI settings used by the data and runtime layers.

pub mod data_processors;
pub mod error;
pub mod models;
pub mod naming;
pub mod settings;
