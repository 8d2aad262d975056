//! Database abstraction layer
//!
//! This module provides a trait-based abstraction for the relational store,
//! so the staged upsert can run against PostgreSQL or an in-memory fake.

pub mod factory;
pub mod traits;

pub use factory::{create_object_store, create_trade_store};
pub use traits::TradeStore;
