//! Core ETL logic.
//!
//! # Modules
//!
//! - [`calendar`] - Inclusive date ranges
//! - [`object_key`] - Date to storage key mapping
//! - [`extract`] - Gzip CSV decoding into trade records
//! - [`dedup`] - Natural-key deduplication
//! - [`upsert`] - Staged, transactional merge into the target table
//! - [`retry`] - Exponential backoff for transient failures
//! - [`pipeline`] - Orchestration, per-date outcomes and run summary
//!
//! # Workflow
//!
//! For every date of the range:
//!
//! 1. **Resolve** the object key
//! 2. **Extract** the day's trades from object storage
//! 3. **Deduplicate** on `(ticker, trade_id)`, last record wins
//! 4. **Upsert** through a per-date staging table
//!
//! A failing date is recorded in the [`pipeline::RunSummary`] and the next
//! date proceeds.
//!
//! # Example
//!
//! ```rust,no_run
//! use trade_backfill::adapters::database::{create_object_store, create_trade_store};
//! use trade_backfill::config::load_config;
//! use trade_backfill::core::calendar::date_range;
//! use trade_backfill::core::pipeline::{BackfillCoordinator, ShutdownSignal};
//! use chrono::NaiveDate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("backfill.toml")?;
//! let range = date_range(
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//! )?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let coordinator = BackfillCoordinator::new(
//!     &config,
//!     create_object_store(&config),
//!     create_trade_store(&config)?,
//!     false,
//!     ShutdownSignal::new(shutdown_rx),
//! );
//!
//! let summary = coordinator.execute(&range).await?;
//! println!("Merged {} of {} dates", summary.merged_dates(), summary.total_dates());
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod dedup;
pub mod extract;
pub mod object_key;
pub mod pipeline;
pub mod retry;
pub mod upsert;
