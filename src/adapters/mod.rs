//! External system integrations.
//!
//! - [`storage`] - Object storage holding the daily flat files (S3-compatible)
//! - [`database`] - Relational store abstraction and adapter factory
//! - [`postgresql`] - PostgreSQL implementation of the relational store
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits
//! ([`storage::ObjectStore`], [`database::TradeStore`]) so the pipeline can
//! be exercised against in-memory implementations.
//!
//! ```rust,no_run
//! use trade_backfill::adapters::database::{create_object_store, create_trade_store};
//! use trade_backfill::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("backfill.toml")?;
//! let objects = create_object_store(&config);
//! let trades = create_trade_store(&config)?;
//!
//! trades.test_connection().await?;
//! let exists = objects
//!     .object_exists("global_crypto/trades_v1/2024/01/2024-01-01.csv.gz")
//!     .await?;
//! println!("{} -> {}", objects.describe(), exists);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod postgresql;
pub mod storage;
