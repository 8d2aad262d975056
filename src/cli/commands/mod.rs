//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod backfill;
pub mod check;
pub mod init;
pub mod validate;
