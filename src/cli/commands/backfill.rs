//! Backfill command implementation
//!
//! This module implements the `backfill` command: resolve, fetch, parse,
//! deduplicate and merge every date of an inclusive range.

use crate::adapters::database::{create_object_store, create_trade_store};
use crate::cli::{exit_code_for, EXIT_INTERRUPTED, EXIT_PARTIAL_FAILURE, EXIT_SUCCESS};
use crate::config::load_config;
use crate::core::calendar::date_range;
use crate::core::pipeline::{BackfillCoordinator, RunSummary, ShutdownSignal};
use crate::log_error_with_context;
use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the backfill command
#[derive(Args, Debug)]
pub struct BackfillArgs {
    /// First date of the range (YYYY-MM-DD)
    #[arg(value_name = "START_DATE")]
    pub start_date: NaiveDate,

    /// Last date of the range, inclusive (YYYY-MM-DD)
    #[arg(value_name = "END_DATE")]
    pub end_date: NaiveDate,

    /// Fetch and parse only; no table is touched
    #[arg(long)]
    pub dry_run: bool,

    /// Override pipeline.max_concurrent_dates (1-32)
    #[arg(long, value_parser = parse_concurrency)]
    pub max_concurrent_dates: Option<usize>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Skip dates an earlier run already merged
    #[arg(long)]
    pub skip_existing: bool,
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    let n: usize = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if (1..=32).contains(&n) {
        Ok(n)
    } else {
        Err(format!("{n} is not in 1..=32"))
    }
}

impl BackfillArgs {
    /// Execute the backfill command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        // The range is checked before any configuration or I/O
        let range = match date_range(self.start_date, self.end_date) {
            Ok(range) => range,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let dry_run = self.dry_run || config.application.dry_run;

        tracing::info!(
            config_path = %config_path,
            start_date = %range.start(),
            end_date = %range.end(),
            dry_run,
            "Starting backfill command"
        );

        let trades = match create_trade_store(&config) {
            Ok(store) => store,
            Err(e) => {
                eprintln!("❌ Failed to create trade store: {e}");
                return Ok(exit_code_for(&e));
            }
        };
        let objects = create_object_store(&config);
        tracing::debug!(storage = %objects.describe(), "Object store ready");

        let mut coordinator = BackfillCoordinator::new(
            &config,
            objects,
            trades,
            dry_run,
            ShutdownSignal::new(shutdown_rx),
        );
        if let Some(n) = self.max_concurrent_dates {
            coordinator = coordinator.with_max_concurrent_dates(n);
        }
        coordinator = coordinator.with_skip_existing(self.skip_existing);

        println!(
            "🚀 Backfilling {} dates ({} to {}) into {}{}",
            range.len(),
            range.start(),
            range.end(),
            config.pipeline.target_table,
            if dry_run { " [dry run]" } else { "" }
        );
        println!();

        let summary = match coordinator.execute(&range).await {
            Ok(summary) => summary,
            Err(e) => {
                log_error_with_context!(e, "Backfill initialization failed");
                eprintln!("❌ Backfill could not start: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        print_summary(&summary);

        if let Some(path) = &self.report {
            match summary.write_report(path) {
                Ok(()) => println!("📄 Report written to {}", path.display()),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to write report");
                    eprintln!("⚠️  Failed to write report {}: {e}", path.display());
                }
            }
        }

        Ok(run_exit_code(&summary))
    }
}

/// Exit status of a completed run
pub fn run_exit_code(summary: &RunSummary) -> i32 {
    if summary.interrupted {
        EXIT_INTERRUPTED
    } else if summary.is_successful() {
        EXIT_SUCCESS
    } else {
        EXIT_PARTIAL_FAILURE
    }
}

fn print_summary(summary: &RunSummary) {
    println!("📊 Backfill Summary");
    println!("==================");
    println!("Run ID: {}", summary.run_id);
    println!("Dates: {}", summary.total_dates());
    println!("  ✅ Merged: {}", summary.merged_dates());
    if summary.skipped_dates() > 0 {
        println!("  ⏭️  Skipped: {}", summary.skipped_dates());
    }
    println!("  ❌ Failed: {}", summary.failed_dates());
    if summary.cancelled_dates() > 0 {
        println!("  ⏹️  Cancelled: {}", summary.cancelled_dates());
    }
    println!("Records extracted: {}", summary.total_records());
    println!("Duplicates removed: {}", summary.total_duplicates());
    println!("Rows merged: {}", summary.total_rows_merged());
    println!("Duration: {:.2}s", summary.duration_ms as f64 / 1000.0);

    if summary.unmerged().next().is_some() {
        println!();
        println!("Unmerged dates:");
        for outcome in summary.unmerged() {
            let at = outcome
                .failed_at
                .map(|stage| format!(" after {stage}"))
                .unwrap_or_default();
            println!(
                "  {} {}{}: {}",
                outcome.date,
                outcome.stage,
                at,
                outcome.error.as_deref().unwrap_or("not processed")
            );
        }
    }

    if summary.dry_run {
        println!();
        println!("Dry run: no table was modified");
    }
    if summary.interrupted {
        println!();
        println!("⚠️  Interrupted by shutdown signal");
    }
    println!();
}
