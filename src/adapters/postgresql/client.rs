//! PostgreSQL client implementation
//!
//! This module provides the pooled client used by the trade store.

use crate::config::schema::PostgreSQLConfig;
use crate::domain::{BackfillError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;

/// SQLSTATE classes worth retrying: connection exception, transaction
/// rollback, insufficient resources, operator intervention
const TRANSIENT_SQLSTATE_CLASSES: [&str; 4] = ["08", "40", "53", "57"];

/// PostgreSQL client
///
/// Wraps a connection pool; every checkout applies the configured statement
/// timeout.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid, TLS cannot be
    /// set up or the pool cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_str()
            .parse()
            .map_err(|e| {
                BackfillError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        pg_config.connect_timeout(Duration::from_secs(config.connection_timeout_seconds));

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                pg_config.ssl_mode(if mode == "require" {
                    SslMode::Require
                } else {
                    SslMode::Prefer
                });
                let connector = native_tls::TlsConnector::builder().build().map_err(|e| {
                    BackfillError::Configuration(format!("Failed to initialise TLS: {e}"))
                })?;
                Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
            }
        };

        let timeout = Some(Duration::from_secs(config.connection_timeout_seconds));
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| {
                BackfillError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool, config })
    }

    /// Get a connection from the pool with the statement timeout applied
    ///
    /// # Errors
    ///
    /// Returns a connection error if no connection can be obtained.
    pub async fn get_connection(&self) -> Result<Object> {
        let client = self.pool.get().await.map_err(map_pool_error)?;

        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.config.statement_timeout_seconds.saturating_mul(1000)
            ))
            .await
            .map_err(|e| map_pg_error("Failed to set statement timeout", e))?;

        Ok(client)
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| map_pg_error("Connection test failed", e))?;

        tracing::debug!(database = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Close the pool; outstanding connections are dropped when returned
    pub fn close(&self) {
        self.pool.close();
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_str())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

/// Strips user info from a connection URL
pub fn redact_connection_string(connection_string: &str) -> String {
    let (scheme, rest) = connection_string
        .split_once("://")
        .unwrap_or(("postgresql", connection_string));

    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => format!("{scheme}://{rest}"),
    }
}

/// Classifies a driver error as transient ([`BackfillError::Connection`])
/// or permanent ([`BackfillError::Database`])
pub fn map_pg_error(context: &str, err: tokio_postgres::Error) -> BackfillError {
    let transient = match err.code() {
        Some(state) => TRANSIENT_SQLSTATE_CLASSES
            .iter()
            .any(|class| state.code().starts_with(class)),
        // No SQLSTATE: I/O failure or closed connection
        None => true,
    };

    let message = match err.as_db_error() {
        Some(db) => format!("{context}: {} ({})", db.message(), db.code().code()),
        None => format!("{context}: {err}"),
    };

    if transient {
        BackfillError::Connection(message)
    } else {
        BackfillError::Database(message)
    }
}

fn map_pool_error(err: PoolError) -> BackfillError {
    match err {
        PoolError::Backend(e) => map_pg_error("Failed to open connection", e),
        other => BackfillError::Connection(format!("Failed to get connection from pool: {other}")),
    }
}
