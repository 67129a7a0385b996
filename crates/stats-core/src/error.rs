use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used to carry transport failures across crate boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors produced by the report engine.
#[derive(Error, Debug)]
pub enum StatsError {
    /// Credentials are missing, malformed, or were rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote listing call for a prefix failed.
    #[error("Failed to list objects under {prefix}: {source}")]
    Listing {
        prefix: String,
        #[source]
        source: StorageError,
    },

    /// A selected report file could not be downloaded.
    #[error("Failed to download {key}: {source}")]
    Download {
        key: String,
        #[source]
        source: StorageError,
    },

    /// A staged CSV file could not be read or streamed.
    #[error("Failed to read CSV file {path}: {source}")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Selection produced no files but an active-device value was required.
    #[error("No report files ending in _{dimension}.csv found under {prefix}")]
    NoFilesSelected { prefix: String, dimension: String },

    /// The staging directory could not be created or removed.
    #[error("Staging area error at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures reported by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Local filesystem failure while reading or writing an object.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (connection, TLS, decoding).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The backend could not obtain credentials for the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Convenience alias used throughout the stats crates.
pub type Result<T> = std::result::Result<T, StatsError>;
