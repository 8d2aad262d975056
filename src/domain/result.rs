//! Result type alias for the backfill crate

use super::errors::BackfillError;

/// Result type alias for backfill operations
///
/// # Examples
///
/// ```
/// use trade_backfill::domain::result::Result;
/// use trade_backfill::domain::errors::BackfillError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(BackfillError::Usage("missing end date".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BackfillError>;
