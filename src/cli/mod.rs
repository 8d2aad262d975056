//! CLI interface and argument parsing
//!
//! This module provides the command-line interface using clap.

pub mod commands;

use crate::domain::BackfillError;
use clap::{Parser, Subcommand};

/// Every date merged
pub const EXIT_SUCCESS: i32 = 0;
/// The run completed but at least one date was not merged
pub const EXIT_PARTIAL_FAILURE: i32 = 1;
/// Bad invocation or invalid date range
pub const EXIT_USAGE: i32 = 2;
/// Missing or invalid configuration
pub const EXIT_CONFIGURATION: i32 = 3;
/// The relational store is unreachable
pub const EXIT_CONNECTION: i32 = 4;
/// Any other fatal error
pub const EXIT_FATAL: i32 = 5;
/// Interrupted by SIGINT/SIGTERM
pub const EXIT_INTERRUPTED: i32 = 130;

/// Maps a fatal, pre-pipeline error to the process exit code
pub fn exit_code_for(err: &BackfillError) -> i32 {
    match err {
        BackfillError::Usage(_) | BackfillError::InvalidRange { .. } => EXIT_USAGE,
        BackfillError::Configuration(_) => EXIT_CONFIGURATION,
        BackfillError::Connection(_) => EXIT_CONNECTION,
        BackfillError::Cancelled(_) => EXIT_INTERRUPTED,
        _ => EXIT_FATAL,
    }
}

/// Trade Backfill - historical trade flat files into PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "trade-backfill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "backfill.toml", env = "BACKFILL_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "BACKFILL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Backfill every date of an inclusive range
    Backfill(commands::backfill::BackfillArgs),

    /// List dates of a range that have no object in storage
    Check(commands::check::CheckArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
