//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{BackfillConfig, LoggingConfig};
use crate::config::secret_string;
use crate::domain::errors::BackfillError;
use crate::domain::result::Result;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BackfillConfig
/// 4. Applies environment variable overrides (BACKFILL_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`BackfillError::Configuration`] if the file cannot be read,
/// a referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use trade_backfill::config::loader::load_config;
///
/// let config = load_config("backfill.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BackfillConfig> {
    load(path.as_ref(), ConfigScope::Full)
}

/// Loads configuration for commands that only read object storage
///
/// The `[postgresql]` section is neither validated nor required to have its
/// `${VAR}` placeholders set; unresolved placeholders there stay verbatim.
///
/// # Errors
///
/// Same as [`load_config`], minus anything coming from `[postgresql]`.
pub fn load_storage_config(path: impl AsRef<Path>) -> Result<BackfillConfig> {
    load(path.as_ref(), ConfigScope::StorageOnly)
}

/// Sections a command needs resolved and valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigScope {
    Full,
    StorageOnly,
}

impl ConfigScope {
    fn requires(self, section: &str) -> bool {
        match self {
            ConfigScope::Full => true,
            ConfigScope::StorageOnly => section != "postgresql",
        }
    }
}

fn load(path: &Path, scope: ConfigScope) -> Result<BackfillConfig> {
    if !path.exists() {
        return Err(BackfillError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BackfillError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents, scope)?;

    let mut config: BackfillConfig = toml::from_str(&contents)
        .map_err(|e| BackfillError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    let validated = match scope {
        ConfigScope::Full => config.validate(),
        ConfigScope::StorageOnly => config.validate_without_postgresql(),
    };
    validated.map_err(|e| {
        BackfillError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Reads only the `[logging]` section of a configuration file
///
/// Logging starts before the full configuration is validated, so every
/// failure here falls back to the defaults. Placeholders are left as-is.
pub fn load_logging_config(path: impl AsRef<Path>) -> LoggingConfig {
    #[derive(Deserialize, Default)]
    struct LoggingOnly {
        #[serde(default)]
        logging: LoggingConfig,
    }

    let mut logging = fs::read_to_string(path)
        .ok()
        .and_then(|contents| toml::from_str::<LoggingOnly>(&contents).ok())
        .unwrap_or_default()
        .logging;

    if let Ok(val) = std::env::var("BACKFILL_LOGGING_LOCAL_ENABLED") {
        logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("BACKFILL_LOGGING_LOCAL_PATH") {
        logging.local_path = val;
    }

    logging
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern"))
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are passed through untouched. A missing variable is only
/// an error inside a section `scope` requires.
///
/// # Errors
///
/// Returns an error naming every required variable that is not set
fn substitute_env_vars(input: &str, scope: ConfigScope) -> Result<String> {
    let re = placeholder_regex();
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();
    let mut section = String::new();

    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            lines.push(line.to_string());
            continue;
        }
        if let Some(header) = trimmed.strip_prefix('[') {
            section = header
                .trim_start_matches('[')
                .split(['.', ']'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&cap[0], &value);
                }
                Err(_) if !scope.requires(&section) => {}
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(BackfillError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using the BACKFILL_* prefix
///
/// Variables follow the pattern `BACKFILL_<SECTION>_<KEY>`, for example
/// `BACKFILL_STORAGE_ACCESS_KEY_ID` or `BACKFILL_PIPELINE_MAX_CONCURRENT_DATES`.
/// Values that fail to parse leave the file value in place.
fn apply_env_overrides(config: &mut BackfillConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("BACKFILL_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("BACKFILL_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Storage overrides
    if let Ok(val) = std::env::var("BACKFILL_STORAGE_ENDPOINT") {
        config.storage.endpoint = val;
    }
    if let Ok(val) = std::env::var("BACKFILL_STORAGE_BUCKET") {
        config.storage.bucket = val;
    }
    if let Ok(val) = std::env::var("BACKFILL_STORAGE_REGION") {
        config.storage.region = val;
    }
    if let Ok(val) = std::env::var("BACKFILL_STORAGE_ACCESS_KEY_ID") {
        config.storage.access_key_id = val;
    }
    if let Ok(val) = std::env::var("BACKFILL_STORAGE_SECRET_ACCESS_KEY") {
        config.storage.secret_access_key = secret_string(val);
    }

    // PostgreSQL overrides
    if let Ok(val) = std::env::var("BACKFILL_POSTGRESQL_CONNECTION_STRING") {
        config.postgresql.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var("BACKFILL_POSTGRESQL_MAX_CONNECTIONS") {
        if let Ok(max) = val.parse() {
            config.postgresql.max_connections = max;
        }
    }
    if let Ok(val) = std::env::var("BACKFILL_POSTGRESQL_SSL_MODE") {
        config.postgresql.ssl_mode = val;
    }

    // Pipeline overrides
    if let Ok(val) = std::env::var("BACKFILL_PIPELINE_TARGET_TABLE") {
        config.pipeline.target_table = val;
    }
    if let Ok(val) = std::env::var("BACKFILL_PIPELINE_MAX_CONCURRENT_DATES") {
        if let Ok(concurrency) = val.parse() {
            config.pipeline.max_concurrent_dates = concurrency;
        }
    }
    if let Ok(val) = std::env::var("BACKFILL_PIPELINE_RETRY_MAX_RETRIES") {
        if let Ok(retries) = val.parse() {
            config.pipeline.retry.max_retries = retries;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("BACKFILL_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("BACKFILL_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}
