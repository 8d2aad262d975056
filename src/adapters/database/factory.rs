//! Adapter construction from configuration

use crate::adapters::database::traits::TradeStore;
use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::adapters::storage::{ObjectStore, S3ObjectStore};
use crate::config::BackfillConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the trade store described by `[postgresql]`
///
/// No connection is opened here; the pool connects lazily.
///
/// # Errors
///
/// Returns a configuration error if the connection string cannot be parsed
/// or TLS cannot be initialised.
pub fn create_trade_store(config: &BackfillConfig) -> Result<Arc<dyn TradeStore>> {
    tracing::debug!("Creating PostgreSQL trade store");
    let client = PostgreSQLClient::new(config.postgresql.clone())?;
    Ok(Arc::new(PostgreSQLAdapter::new(client)))
}

/// Create the object store described by `[storage]`
pub fn create_object_store(config: &BackfillConfig) -> Arc<dyn ObjectStore> {
    tracing::debug!(endpoint = %config.storage.endpoint, "Creating S3 object store");
    Arc::new(S3ObjectStore::new(&config.storage))
}
