// Trade Backfill - Historical trade flat files into PostgreSQL
// Copyright (c) 2025 Trade Backfill Contributors
// Licensed under the MIT License

//! # Trade Backfill
//!
//! Trade Backfill loads historical daily trade flat files from S3-compatible
//! object storage into a PostgreSQL `trades` table.
//!
//! ## Overview
//!
//! For every date of an inclusive range the pipeline:
//! - **Resolves** the object key `global_crypto/trades_v1/YYYY/MM/YYYY-MM-DD.csv.gz`
//! - **Extracts** typed [`domain::TradeRecord`]s from the gzip-compressed CSV
//! - **Deduplicates** on the natural key `(ticker, trade_id)`, last record wins
//! - **Upserts** through a per-date staging table and a single merge statement
//!
//! A failing date is recorded in the [`core::pipeline::RunSummary`] and the
//! run moves on. Re-running a range is idempotent.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline stages and orchestration
//! - [`adapters`] - Object storage (S3) and relational store (PostgreSQL)
//! - [`domain`] - Trade records and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use trade_backfill::adapters::database::{create_object_store, create_trade_store};
//! use trade_backfill::config::load_config;
//! use trade_backfill::core::calendar::date_range;
//! use trade_backfill::core::pipeline::{BackfillCoordinator, ShutdownSignal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("backfill.toml")?;
//!     let range = date_range(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
//!     )?;
//!
//!     let coordinator = BackfillCoordinator::new(
//!         &config,
//!         create_object_store(&config),
//!         create_trade_store(&config)?,
//!         false,
//!         ShutdownSignal::never(),
//!     );
//!
//!     let summary = coordinator.execute(&range).await?;
//!     println!("Merged {} of {} dates", summary.merged_dates(), summary.total_dates());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::Result`], whose error is
//! [`domain::BackfillError`]. Stage errors convert with `?`.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
