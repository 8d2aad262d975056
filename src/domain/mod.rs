//! Domain models and types for the backfill pipeline.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Trade records** ([`TradeRecord`]) and their natural key ([`TradeKey`])
//! - **Error types** ([`BackfillError`], [`ExtractionError`], [`MergeError`], [`StorageError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, BackfillError>`]. Stage errors
//! convert into [`BackfillError`] with `?`:
//!
//! ```rust
//! use trade_backfill::domain::{BackfillError, ExtractionError, Result};
//!
//! fn parse_price(raw: &str) -> Result<f64> {
//!     raw.parse().map_err(|_| {
//!         ExtractionError::Schema {
//!             line: 2,
//!             message: format!("invalid price '{raw}'"),
//!         }
//!         .into()
//!     })
//! }
//!
//! assert!(matches!(parse_price("abc"), Err(BackfillError::Extraction(_))));
//! ```

pub mod errors;
pub mod result;
pub mod trade;

// Re-export commonly used types for convenience
pub use errors::{BackfillError, ErrorKind, ExtractionError, MergeError, StorageError};
pub use result::Result;
pub use trade::{TradeKey, TradeRecord};
