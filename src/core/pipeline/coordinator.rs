//! Backfill coordinator
//!
//! Drives a date range through extract, deduplicate and upsert. A failing
//! date is recorded and the run moves on; only initialization errors are
//! fatal.

use crate::adapters::database::TradeStore;
use crate::adapters::storage::ObjectStore;
use crate::config::BackfillConfig;
use crate::core::calendar::DateRange;
use crate::core::dedup::deduplicate;
use crate::core::extract::RecordExtractor;
use crate::core::object_key::{self, ObjectKey};
use crate::core::pipeline::shutdown::ShutdownSignal;
use crate::core::pipeline::summary::{DateOutcome, DateStage, RunSummary};
use crate::core::retry::RetryPolicy;
use crate::core::upsert::StagingUpserter;
use crate::domain::{BackfillError, Result};
use crate::{log_date_complete, log_date_start};
use chrono::NaiveDate;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Explicit per-run context: collaborators, settings and the shutdown signal
pub struct BackfillCoordinator {
    extractor: RecordExtractor,
    upserter: StagingUpserter,
    trades: Arc<dyn TradeStore>,
    max_concurrent_dates: usize,
    skip_existing: bool,
    dry_run: bool,
    shutdown: ShutdownSignal,
}

impl BackfillCoordinator {
    /// Create a coordinator from configuration
    ///
    /// `dry_run` is the effective flag (CLI or `[application]`).
    pub fn new(
        config: &BackfillConfig,
        objects: Arc<dyn ObjectStore>,
        trades: Arc<dyn TradeStore>,
        dry_run: bool,
        shutdown: ShutdownSignal,
    ) -> Self {
        let retry = RetryPolicy::from(&config.pipeline.retry);

        Self {
            extractor: RecordExtractor::new(objects, retry),
            upserter: StagingUpserter::from_config(trades.clone(), &config.pipeline, dry_run),
            trades,
            max_concurrent_dates: config.pipeline.max_concurrent_dates.max(1),
            skip_existing: false,
            dry_run,
            shutdown,
        }
    }

    /// Override the number of dates processed concurrently
    pub fn with_max_concurrent_dates(mut self, max_concurrent_dates: usize) -> Self {
        self.max_concurrent_dates = max_concurrent_dates.max(1);
        self
    }

    /// Skip dates the loaded-dates table already records as merged
    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    /// Verify the relational store and bootstrap the target tables
    ///
    /// In dry-run mode the connection is tested but no table is created.
    ///
    /// # Errors
    ///
    /// Returns [`BackfillError::Connection`] if the store is unreachable.
    pub async fn initialize(&self) -> Result<()> {
        self.trades.test_connection().await.map_err(|e| match e {
            BackfillError::Database(message) => BackfillError::Connection(message),
            other => other,
        })?;

        if !self.dry_run {
            self.trades
                .ensure_schema(self.upserter.target_table())
                .await?;
            if let Some(ledger) = self.upserter.loaded_dates_table() {
                self.trades.ensure_loaded_dates(ledger).await?;
            }
        }

        tracing::info!(
            store = %self.trades.describe(),
            target_table = self.upserter.target_table(),
            "Relational store ready"
        );
        Ok(())
    }

    /// Release pooled connections
    pub async fn teardown(&self) {
        self.trades.close().await;
    }

    /// Dates of `range` to skip; empty unless `--skip-existing` is on
    ///
    /// # Errors
    ///
    /// Returns the store error if the loaded-dates table cannot be read.
    pub async fn already_loaded(&self, range: &DateRange) -> Result<HashSet<NaiveDate>> {
        let ledger = match self.upserter.loaded_dates_table() {
            Some(ledger) if self.skip_existing => ledger,
            _ => return Ok(HashSet::new()),
        };

        let dates: HashSet<NaiveDate> = self
            .trades
            .loaded_dates(ledger, range.start(), range.end())
            .await?
            .into_iter()
            .collect();

        tracing::info!(table = ledger, dates = dates.len(), "Found dates merged by earlier runs");
        Ok(dates)
    }

    /// Initialize, run the whole range, then tear down
    ///
    /// # Errors
    ///
    /// Only initialization errors are returned; per-date failures are part
    /// of the summary.
    pub async fn execute(&self, range: &DateRange) -> Result<RunSummary> {
        let skipped = match self.initialize().await {
            Ok(()) => self.already_loaded(range).await,
            Err(e) => Err(e),
        };
        let skipped = match skipped {
            Ok(skipped) => skipped,
            Err(e) => {
                self.teardown().await;
                return Err(e);
            }
        };

        let summary = self.run_skipping(range, &skipped).await;
        self.teardown().await;
        Ok(summary)
    }

    /// Process every date of `range`, at most `max_concurrent_dates` at a time
    ///
    /// Outcomes are reported in date order.
    pub async fn run(&self, range: &DateRange) -> RunSummary {
        self.run_skipping(range, &HashSet::new()).await
    }

    /// Like [`run`](Self::run), recording the dates in `skipped` as `Skipped`
    pub async fn run_skipping(
        &self,
        range: &DateRange,
        skipped: &HashSet<NaiveDate>,
    ) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::new(Uuid::new_v4(), range.start(), range.end(), self.dry_run);

        tracing::info!(
            run_id = %summary.run_id,
            start_date = %range.start(),
            end_date = %range.end(),
            dates = range.len(),
            max_concurrent_dates = self.max_concurrent_dates,
            skipped = skipped.len(),
            dry_run = self.dry_run,
            "Starting backfill"
        );

        summary.outcomes = futures::stream::iter(range.iter())
            .map(|date| self.process_date(date, skipped.contains(&date)))
            .buffered(self.max_concurrent_dates)
            .collect()
            .await;

        summary.interrupted = self.shutdown.is_requested();
        summary.duration_ms = started.elapsed().as_millis() as u64;
        summary.log_summary();
        summary
    }

    async fn process_date(&self, date: NaiveDate, skip: bool) -> DateOutcome {
        let key = object_key::resolve(date);
        let mut outcome = DateOutcome::pending(date, key.clone());

        if skip {
            tracing::info!(%date, object_key = %key, "Skipping date merged by an earlier run");
            outcome.advance(DateStage::Skipped);
            return outcome;
        }

        if self.shutdown.is_requested() {
            outcome.fail(&BackfillError::Cancelled(
                "shutdown requested before the date started".to_string(),
            ));
            return outcome;
        }

        let started = Instant::now();
        log_date_start!(date, key);

        let result = self.run_stages(date, &key, &mut outcome).await;
        outcome.duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                log_date_complete!(
                    date,
                    outcome.records_extracted,
                    outcome.rows_merged,
                    started.elapsed()
                );
            }
            Err(e) => {
                outcome.fail(&e);
                tracing::warn!(
                    %date,
                    object_key = %key,
                    stage = ?outcome.failed_at,
                    error_kind = ?outcome.error_kind,
                    error = %e,
                    "Date {}", outcome.stage
                );
            }
        }

        outcome
    }

    async fn run_stages(
        &self,
        date: NaiveDate,
        key: &ObjectKey,
        outcome: &mut DateOutcome,
    ) -> Result<()> {
        let records = tokio::select! {
            biased;
            _ = self.shutdown.requested() => {
                Err(BackfillError::Cancelled("extraction abandoned".to_string()))
            }
            result = self.extractor.extract(key, &self.shutdown) => result,
        }?;
        outcome.records_extracted = records.len();
        outcome.advance(DateStage::Extracted);

        let batch = deduplicate(records);
        outcome.duplicates_removed = batch.duplicates_removed;
        outcome.advance(DateStage::Deduplicated);

        if batch.duplicates_removed > 0 {
            tracing::debug!(
                %date,
                duplicates_removed = batch.duplicates_removed,
                "Collapsed duplicate trade keys"
            );
        }

        outcome.rows_merged = self
            .upserter
            .upsert(date, &batch.records, &self.shutdown)
            .await?;
        outcome.advance(DateStage::Merged);
        Ok(())
    }
}
