//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the backfill configuration file without opening any connection.

use crate::adapters::postgresql::client::redact_connection_string;
use crate::cli::{EXIT_CONFIGURATION, EXIT_SUCCESS};
use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config substitutes, overrides and validates in one pass
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                println!();
                return Ok(EXIT_CONFIGURATION);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Storage Endpoint: {}", config.storage.endpoint);
        println!("  Storage Bucket: {}", config.storage.bucket);
        println!("  Storage Region: {}", config.storage.region);
        println!(
            "  PostgreSQL Connection: {}",
            redact_connection_string(config.postgresql.connection_string.expose_secret().as_str())
        );
        println!("  Max Connections: {}", config.postgresql.max_connections);
        println!("  Target Table: {}", config.pipeline.target_table);
        println!(
            "  Staging Table Prefix: {}",
            config.pipeline.staging_table_prefix
        );
        println!(
            "  Loaded Dates Table: {}",
            config.pipeline.loaded_dates_table
        );
        println!(
            "  Max Concurrent Dates: {}",
            config.pipeline.max_concurrent_dates
        );
        println!("  Max Retries: {}", config.pipeline.retry.max_retries);
        if config.logging.local_enabled {
            println!("  Log Directory: {}", config.logging.local_path);
        }
        println!();

        Ok(EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_validate_missing_file_is_configuration_error() {
        let args = ValidateArgs {};
        let code = args.execute("does-not-exist.toml").await.unwrap();
        assert_eq!(code, EXIT_CONFIGURATION);
    }

    #[tokio::test]
    async fn test_validate_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[storage]
access_key_id = "AKIAEXAMPLE"
secret_access_key = "s3cret"

[postgresql]
connection_string = "postgresql://backfill:pw@localhost:5432/market"
"#,
        )
        .unwrap();
        file.flush().unwrap();

        let args = ValidateArgs {};
        let code = args
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_SUCCESS);
    }
}
