//! Relational store abstraction
//!
//! This module defines the operations the staged upsert needs from the
//! database holding the `trades` relation.

use crate::domain::{Result, TradeRecord};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Relational store for trade records
///
/// Table names are validated identifiers chosen by the caller. Errors are
/// reported as [`crate::domain::BackfillError::Connection`] when the
/// operation may succeed on retry and as
/// [`crate::domain::BackfillError::Database`] otherwise.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Test the database connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Create the target table and its `(ticker, trade_id)` key if missing
    async fn ensure_schema(&self, target: &str) -> Result<()>;

    /// Create an empty staging table shaped like `target`
    ///
    /// A leftover table with the same name is replaced.
    async fn create_staging(&self, staging: &str, target: &str) -> Result<()>;

    /// Bulk-load `records` into the staging table, returning the row count
    async fn load_staging(&self, staging: &str, records: &[TradeRecord]) -> Result<u64>;

    /// Merge the staging table into `target` in one transaction
    ///
    /// Absent keys are inserted, existing keys have their mutable columns
    /// overwritten. Returns the number of rows inserted or updated.
    async fn merge_staging(&self, staging: &str, target: &str) -> Result<u64>;

    /// Drop the staging table if it exists
    async fn drop_staging(&self, staging: &str) -> Result<()>;

    /// Create the table recording merged dates if missing
    async fn ensure_loaded_dates(&self, ledger: &str) -> Result<()>;

    /// Record that `date` was merged with `rows` rows
    async fn record_loaded_date(&self, ledger: &str, date: NaiveDate, rows: u64) -> Result<()>;

    /// Dates in `start..=end` recorded as merged, ascending
    ///
    /// A ledger that does not exist yet holds no dates.
    async fn loaded_dates(
        &self,
        ledger: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>>;

    /// Release pooled connections
    async fn close(&self) {}

    /// Redacted description of the store for logs
    fn describe(&self) -> String;
}
