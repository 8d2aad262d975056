//! PostgreSQL database integration
//!
//! This module provides the PostgreSQL implementation of
//! [`crate::adapters::database::TradeStore`].

pub mod adapter;
pub mod client;
pub mod sql;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
