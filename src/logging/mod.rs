//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Configurable log levels (`--log-level`, `RUST_LOG`)
//! - Local JSON file logging with rotation
//! - Event macros shared by the pipeline stages
//!
//! # Example
//!
//! ```no_run
//! use trade_backfill::logging::init_logging;
//! use trade_backfill::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Backfill started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the start of one date's processing
///
/// # Example
///
/// ```no_run
/// use trade_backfill::log_date_start;
///
/// let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// log_date_start!(date, "global_crypto/trades_v1/2024/01/2024-01-01.csv.gz");
/// ```
#[macro_export]
macro_rules! log_date_start {
    ($date:expr, $object_key:expr) => {
        tracing::info!(
            date = %$date,
            object_key = %$object_key,
            "Processing date"
        );
    };
}

/// Log the successful merge of one date
///
/// # Example
///
/// ```no_run
/// use trade_backfill::log_date_complete;
/// use std::time::Duration;
///
/// let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// log_date_complete!(date, 1200, 1187, Duration::from_secs(4));
/// ```
#[macro_export]
macro_rules! log_date_complete {
    ($date:expr, $extracted:expr, $merged:expr, $duration:expr) => {
        tracing::info!(
            date = %$date,
            extracted = $extracted,
            merged = $merged,
            duration_ms = $duration.as_millis() as u64,
            "Date merged"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use trade_backfill::log_error_with_context;
/// use trade_backfill::domain::BackfillError;
///
/// let error = BackfillError::Configuration("missing bucket".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use trade_backfill::log_retry_attempt;
/// use std::time::Duration;
///
/// log_retry_attempt!("fetch object", 2, 4, Duration::from_millis(1000), "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($operation:expr, $attempt:expr, $max_attempts:expr, $delay:expr, $reason:expr) => {
        tracing::warn!(
            operation = $operation,
            attempt = $attempt,
            max_attempts = $max_attempts,
            delay_ms = $delay.as_millis() as u64,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
