//! Domain error types
//!
//! This module defines the error hierarchy for the backfill pipeline.
//! Errors are domain-specific and don't expose third-party types: the
//! adapters translate SDK and driver errors into these variants.

use chrono::NaiveDate;
use thiserror::Error;

/// Main backfill error type
///
/// This is the primary error type used throughout the application.
/// It wraps the stage-specific error types and carries enough context
/// to decide whether a failure is fatal, per-date, or retryable.
#[derive(Debug, Error)]
pub enum BackfillError {
    /// Bad command-line invocation
    #[error("Usage error: {0}")]
    Usage(String),

    /// Configuration-related errors (missing credentials, invalid values)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested date range is empty
    #[error("Invalid date range: start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Extraction of one date's flat file failed
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Staged merge of one date's batch failed
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Database errors that are not expected to succeed on retry
    #[error("Database error: {0}")]
    Database(String),

    /// Network/connection errors against the relational store
    #[error("Connection error: {0}")]
    Connection(String),

    /// Work abandoned because shutdown was requested
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl BackfillError {
    /// Whether retrying the failed operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BackfillError::Connection(_) => true,
            BackfillError::Storage(e) => e.is_retryable(),
            BackfillError::Extraction(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Object storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object exists under the key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The request failed (timeout, throttling, transport)
    #[error("Request failed: {0}")]
    Request(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Request(_))
    }
}

/// Errors raised while turning one date's object into trade records
///
/// Any of these fails the whole extraction for that date.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No object exists for the date
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Fetching the object failed
    #[error("Failed to fetch object: {0}")]
    Fetch(String),

    /// The payload is not valid gzip
    #[error("Failed to decompress object: {0}")]
    Decompression(String),

    /// A row violates the fixed trade schema
    #[error("Schema violation at line {line}: {message}")]
    Schema { line: u64, message: String },
}

impl ExtractionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionError::Fetch(_))
    }
}

/// Errors raised by the staged upsert of one date's batch
///
/// The staging table has already been dropped by the time one of these
/// reaches the orchestrator. Transient failures were already retried,
/// so these are final.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Creating the staging table failed
    #[error("Failed to create staging table {table}: {message}")]
    Staging { table: String, message: String },

    /// Loading the batch into the staging table failed
    #[error("Failed to load staging table {table}: {message}")]
    Load { table: String, message: String },

    /// The transactional merge into the target table failed
    #[error("Merge transaction from {table} failed: {message}")]
    Transaction { table: String, message: String },

    /// Shutdown was requested before the merge started
    #[error("Merge from {table} cancelled")]
    Cancelled { table: String },
}

/// Error classification recorded on a failed date
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    Merge,
    Cancelled,
    Other,
}

impl From<&BackfillError> for ErrorKind {
    fn from(err: &BackfillError) -> Self {
        match err {
            BackfillError::Extraction(_) | BackfillError::Storage(_) => ErrorKind::Extraction,
            BackfillError::Merge(MergeError::Cancelled { .. }) | BackfillError::Cancelled(_) => {
                ErrorKind::Cancelled
            }
            BackfillError::Merge(_) => ErrorKind::Merge,
            _ => ErrorKind::Other,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Extraction => "extraction",
            ErrorKind::Merge => "merge",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for BackfillError {
    fn from(err: std::io::Error) -> Self {
        BackfillError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BackfillError {
    fn from(err: serde_json::Error) -> Self {
        BackfillError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BackfillError {
    fn from(err: toml::de::Error) -> Self {
        BackfillError::Configuration(format!("TOML parse error: {err}"))
    }
}
