//! Staged, transactional upsert of one date's batch
//!
//! Each date gets its own staging table `{prefix}_{YYYYMMDD}`:
//!
//! 1. create the staging table (replacing any leftover)
//! 2. bulk-load the batch
//! 3. merge into the target in one transaction
//! 4. record the date in the loaded-dates table, when one is configured
//! 5. drop the staging table, whatever happened before
//!
//! Steps 1 and 2 are retried together, so every load lands in an empty
//! table. Shutdown abandons a date only before step 3 starts; a merge in
//! flight runs to its COMMIT.
//!
//! The merge is keyed solely on `(ticker, trade_id)` and overwrites the
//! mutable columns, so applying the same batch twice leaves the target as
//! applying it once.

use crate::adapters::database::TradeStore;
use crate::config::PipelineConfig;
use crate::core::pipeline::ShutdownSignal;
use crate::core::retry::RetryPolicy;
use crate::domain::{BackfillError, MergeError, Result, TradeRecord};
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct StagingUpserter {
    store: Arc<dyn TradeStore>,
    retry: RetryPolicy,
    target_table: String,
    staging_prefix: String,
    loaded_dates_table: Option<String>,
    dry_run: bool,
}

impl StagingUpserter {
    pub fn new(
        store: Arc<dyn TradeStore>,
        retry: RetryPolicy,
        target_table: impl Into<String>,
        staging_prefix: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            retry,
            target_table: target_table.into(),
            staging_prefix: staging_prefix.into(),
            loaded_dates_table: None,
            dry_run,
        }
    }

    /// Record every merged date in `table`
    pub fn with_loaded_dates_table(mut self, table: impl Into<String>) -> Self {
        self.loaded_dates_table = Some(table.into());
        self
    }

    pub fn from_config(store: Arc<dyn TradeStore>, config: &PipelineConfig, dry_run: bool) -> Self {
        Self::new(
            store,
            RetryPolicy::from(&config.retry),
            config.target_table.clone(),
            config.staging_table_prefix.clone(),
            dry_run,
        )
        .with_loaded_dates_table(config.loaded_dates_table.clone())
    }

    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn loaded_dates_table(&self) -> Option<&str> {
        self.loaded_dates_table.as_deref()
    }

    /// Name of the staging table used for `date`
    pub fn staging_table_for(&self, date: NaiveDate) -> String {
        format!("{}_{}", self.staging_prefix, date.format("%Y%m%d"))
    }

    /// Stage and merge `records`, returning the number of rows merged
    ///
    /// In dry-run mode nothing is written and zero is returned.
    ///
    /// # Errors
    ///
    /// Returns [`BackfillError::Merge`] once retries are exhausted or
    /// shutdown interrupts the work. The staging table has been dropped by
    /// then.
    pub async fn upsert(
        &self,
        date: NaiveDate,
        records: &[TradeRecord],
        shutdown: &ShutdownSignal,
    ) -> Result<u64> {
        let staging = self.staging_table_for(date);

        if self.dry_run {
            tracing::info!(
                %date,
                records = records.len(),
                staging_table = %staging,
                target_table = %self.target_table,
                "DRY RUN: Would merge records"
            );
            return Ok(0);
        }

        if shutdown.is_requested() {
            return Err(MergeError::Cancelled { table: staging }.into());
        }

        let staged = tokio::select! {
            biased;
            _ = shutdown.requested() => Err(MergeError::Cancelled { table: staging.clone() }),
            result = self.stage(&staging, records, shutdown) => result,
        };

        let outcome = match staged {
            Ok(_) if shutdown.is_requested() => Err(MergeError::Cancelled {
                table: staging.clone(),
            }),
            Ok(_) => self.merge(&staging, shutdown).await,
            Err(e) => Err(e),
        };

        if let Ok(rows) = &outcome {
            self.record_loaded_date(date, *rows, shutdown).await;
        }

        self.drop_staging(&staging).await;

        outcome.map_err(BackfillError::from)
    }

    /// Creates the staging table and loads `records` into it
    async fn stage(
        &self,
        staging: &str,
        records: &[TradeRecord],
        shutdown: &ShutdownSignal,
    ) -> std::result::Result<u64, MergeError> {
        let store = &*self.store;
        let target = self.target_table.as_str();
        let created = AtomicBool::new(false);

        let loaded = self
            .retry
            .run("stage batch", shutdown, || {
                let created = &created;
                async move {
                    created.store(false, Ordering::SeqCst);
                    store.create_staging(staging, target).await?;
                    created.store(true, Ordering::SeqCst);
                    store.load_staging(staging, records).await
                }
            })
            .await
            .map_err(|e| {
                let table = staging.to_string();
                let message = e.to_string();
                if created.load(Ordering::SeqCst) {
                    MergeError::Load { table, message }
                } else {
                    MergeError::Staging { table, message }
                }
            })?;

        tracing::debug!(staging_table = staging, rows = loaded, "Staging table loaded");
        Ok(loaded)
    }

    /// Merges the staging table into the target; not raced against shutdown
    async fn merge(
        &self,
        staging: &str,
        shutdown: &ShutdownSignal,
    ) -> std::result::Result<u64, MergeError> {
        let store = &*self.store;
        let target = self.target_table.as_str();

        // Re-running a merge whose COMMIT outcome is unknown is safe
        self.retry
            .run("merge staging", shutdown, move || {
                store.merge_staging(staging, target)
            })
            .await
            .map_err(|e| MergeError::Transaction {
                table: staging.to_string(),
                message: e.to_string(),
            })
    }

    /// Failing to record only costs a reprocessed date on `--skip-existing`
    async fn record_loaded_date(&self, date: NaiveDate, rows: u64, shutdown: &ShutdownSignal) {
        let Some(ledger) = self.loaded_dates_table.as_deref() else {
            return;
        };
        let store = &*self.store;
        let result = self
            .retry
            .run("record loaded date", shutdown, move || {
                store.record_loaded_date(ledger, date, rows)
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(%date, table = ledger, error = %e, "Failed to record loaded date");
        }
    }

    /// Drops the staging table; runs to completion even during shutdown
    async fn drop_staging(&self, staging: &str) {
        let store = &*self.store;
        let result = self
            .retry
            .run("drop staging", &ShutdownSignal::never(), move || {
                store.drop_staging(staging)
            })
            .await;

        if let Err(e) = result {
            // The next run for this date replaces the leftover table
            tracing::error!(staging_table = staging, error = %e, "Failed to drop staging table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::watch;

    /// Records every call; fails the named operation
    #[derive(Default)]
    struct ScriptedStore {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        drop_connection_once: Mutex<Option<&'static str>>,
        shutdown_during_merge: Mutex<Option<watch::Sender<bool>>>,
    }

    impl ScriptedStore {
        fn failing(op: &'static str) -> Self {
            Self {
                fail_on: Some(op),
                ..Self::default()
            }
        }

        /// The first call of `op` completes, then reports a lost connection
        fn dropping_connection_after(op: &'static str) -> Self {
            Self {
                drop_connection_once: Mutex::new(Some(op)),
                ..Self::default()
            }
        }

        fn record(&self, op: &str) -> Result<()> {
            self.calls.lock().unwrap().push(op.to_string());
            if self.fail_on == Some(op) {
                return Err(BackfillError::Database(format!("{op} rejected")));
            }
            let mut once = self.drop_connection_once.lock().unwrap();
            if *once == Some(op) {
                *once = None;
                return Err(BackfillError::Connection("connection reset by peer".to_string()));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TradeStore for ScriptedStore {
        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        async fn ensure_schema(&self, _target: &str) -> Result<()> {
            Ok(())
        }

        async fn create_staging(&self, _staging: &str, _target: &str) -> Result<()> {
            self.record("create")
        }

        async fn load_staging(&self, _staging: &str, records: &[TradeRecord]) -> Result<u64> {
            self.record("load")?;
            Ok(records.len() as u64)
        }

        async fn merge_staging(&self, _staging: &str, _target: &str) -> Result<u64> {
            let sender = self.shutdown_during_merge.lock().unwrap().take();
            if let Some(tx) = sender {
                tx.send(true).unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            self.record("merge")?;
            Ok(1)
        }

        async fn drop_staging(&self, _staging: &str) -> Result<()> {
            self.record("drop")
        }

        async fn ensure_loaded_dates(&self, _ledger: &str) -> Result<()> {
            Ok(())
        }

        async fn record_loaded_date(
            &self,
            _ledger: &str,
            _date: NaiveDate,
            _rows: u64,
        ) -> Result<()> {
            self.record("record")
        }

        async fn loaded_dates(
            &self,
            _ledger: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<NaiveDate>> {
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn upserter(store: Arc<ScriptedStore>, dry_run: bool) -> StagingUpserter {
        StagingUpserter::new(store, RetryPolicy::none(), "trades", "trades_staging", dry_run)
    }

    fn retrying_upserter(store: Arc<ScriptedStore>) -> StagingUpserter {
        let retry = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1), 1.0);
        StagingUpserter::new(store, retry, "trades", "trades_staging", false)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn batch() -> Vec<TradeRecord> {
        vec![TradeRecord {
            ticker: "X:BTC-USD".to_string(),
            condition_id: 1,
            exchange_id: 1,
            trade_id: 1,
            timestamp: 1,
            price: 1.0,
            size: 1.0,
        }]
    }

    #[test]
    fn test_staging_table_name() {
        let upserter = upserter(Arc::new(ScriptedStore::default()), false);
        assert_eq!(upserter.staging_table_for(date()), "trades_staging_20240102");
    }

    #[tokio::test]
    async fn test_success_path_order() {
        let store = Arc::new(ScriptedStore::default());
        let merged = upserter(store.clone(), false)
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(merged, 1);
        assert_eq!(store.calls(), vec!["create", "load", "merge", "drop"]);
    }

    #[tokio::test]
    async fn test_merged_date_is_recorded_before_drop() {
        let store = Arc::new(ScriptedStore::default());
        upserter(store.clone(), false)
            .with_loaded_dates_table("trades_loaded_dates")
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(store.calls(), vec!["create", "load", "merge", "record", "drop"]);
    }

    #[tokio::test]
    async fn test_failed_record_keeps_merge_result() {
        let store = Arc::new(ScriptedStore::failing("record"));
        let merged = upserter(store.clone(), false)
            .with_loaded_dates_table("trades_loaded_dates")
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(merged, 1);
        assert_eq!(store.calls(), vec!["create", "load", "merge", "record", "drop"]);
    }

    #[tokio::test]
    async fn test_staging_dropped_after_merge_failure() {
        let store = Arc::new(ScriptedStore::failing("merge"));
        let err = upserter(store.clone(), false)
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BackfillError::Merge(MergeError::Transaction { .. })
        ));
        assert_eq!(store.calls(), vec!["create", "load", "merge", "drop"]);
    }

    #[tokio::test]
    async fn test_staging_dropped_after_load_failure() {
        let store = Arc::new(ScriptedStore::failing("load"));
        let err = upserter(store.clone(), false)
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, BackfillError::Merge(MergeError::Load { .. })));
        assert_eq!(store.calls(), vec!["create", "load", "drop"]);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let store = Arc::new(ScriptedStore::default());
        let merged = upserter(store.clone(), true)
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(merged, 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_before_start_is_cancelled() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();

        let store = Arc::new(ScriptedStore::default());
        let err = upserter(store.clone(), false)
            .upsert(date(), &batch(), &ShutdownSignal::new(rx))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BackfillError::Merge(MergeError::Cancelled { .. })
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_retry_recreates_staging_table() {
        let store = Arc::new(ScriptedStore::dropping_connection_after("load"));
        let merged = retrying_upserter(store.clone())
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap();

        assert_eq!(merged, 1);
        assert_eq!(
            store.calls(),
            vec!["create", "load", "create", "load", "merge", "drop"]
        );
    }

    #[tokio::test]
    async fn test_exhausted_create_retries_report_staging_error() {
        let store = Arc::new(ScriptedStore::failing("create"));
        let err = retrying_upserter(store.clone())
            .upsert(date(), &batch(), &ShutdownSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BackfillError::Merge(MergeError::Staging { .. })
        ));
        assert_eq!(store.calls(), vec!["create", "drop"]);
    }

    #[tokio::test]
    async fn test_shutdown_during_merge_lets_commit_finish() {
        let (tx, rx) = watch::channel(false);
        let store = Arc::new(ScriptedStore::default());
        *store.shutdown_during_merge.lock().unwrap() = Some(tx);
        let shutdown = ShutdownSignal::new(rx);

        let merged = upserter(store.clone(), false)
            .upsert(date(), &batch(), &shutdown)
            .await
            .unwrap();

        assert!(shutdown.is_requested());
        assert_eq!(merged, 1);
        assert_eq!(store.calls(), vec!["create", "load", "merge", "drop"]);
    }
}
