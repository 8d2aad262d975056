//! Check command implementation
//!
//! This module implements the `check` command, which reports the dates of a
//! range whose flat file is absent from object storage. Nothing is fetched
//! and the database is never contacted.

use crate::adapters::database::create_object_store;
use crate::adapters::storage::ObjectStore;
use crate::cli::{exit_code_for, EXIT_PARTIAL_FAILURE, EXIT_SUCCESS};
use crate::config::load_storage_config;
use crate::core::calendar::{date_range, DateRange};
use crate::core::object_key::{self, ObjectKey};
use chrono::NaiveDate;
use clap::Args;
use futures::StreamExt;

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// First date of the range (YYYY-MM-DD)
    #[arg(value_name = "START_DATE")]
    pub start_date: NaiveDate,

    /// Last date of the range, inclusive (YYYY-MM-DD)
    #[arg(value_name = "END_DATE")]
    pub end_date: NaiveDate,
}

/// Availability of one date's object
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Present,
    Missing,
    Unknown(String),
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let range = match date_range(self.start_date, self.end_date) {
            Ok(range) => range,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let config = match load_storage_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!(
            "🔍 Checking {} dates ({} to {}) in {}",
            range.len(),
            range.start(),
            range.end(),
            config.storage.bucket
        );
        println!();

        let store = create_object_store(&config);
        let results =
            check_range(store.as_ref(), &range, config.pipeline.max_concurrent_dates).await;

        let mut problems = 0;
        for (date, key, availability) in &results {
            match availability {
                Availability::Present => {}
                Availability::Missing => {
                    problems += 1;
                    println!("  ❌ {date} missing ({key})");
                }
                Availability::Unknown(reason) => {
                    problems += 1;
                    println!("  ⚠️  {date} unknown: {reason}");
                }
            }
        }

        if problems == 0 {
            println!("✅ All {} objects present", results.len());
            Ok(EXIT_SUCCESS)
        } else {
            println!();
            println!("{problems} of {} dates unavailable", results.len());
            Ok(EXIT_PARTIAL_FAILURE)
        }
    }
}

/// Probe the object of every date in `range`, in date order
pub async fn check_range(
    store: &dyn ObjectStore,
    range: &DateRange,
    concurrency: usize,
) -> Vec<(NaiveDate, ObjectKey, Availability)> {
    futures::stream::iter(range.iter())
        .map(|date| async move {
            let key = object_key::resolve(date);
            let availability = match store.object_exists(key.as_str()).await {
                Ok(true) => Availability::Present,
                Ok(false) => Availability::Missing,
                Err(e) => Availability::Unknown(e.to_string()),
            };
            tracing::debug!(%date, key = %key, ?availability, "Checked object");
            (date, key, availability)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
