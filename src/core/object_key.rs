//! Date to object key mapping
//!
//! Daily trade files are partitioned by year and month:
//! `global_crypto/trades_v1/{YYYY}/{MM}/{YYYY-MM-DD}.csv.gz`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every daily trades object
pub const TRADES_PREFIX: &str = "global_crypto/trades_v1";

/// Storage key of one date's trades file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves the object key holding the trades of `date`
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use trade_backfill::core::object_key::resolve;
///
/// let key = resolve(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
/// assert_eq!(key.as_str(), "global_crypto/trades_v1/2024/03/2024-03-07.csv.gz");
/// ```
pub fn resolve(date: NaiveDate) -> ObjectKey {
    ObjectKey(format!(
        "{TRADES_PREFIX}/{:04}/{:02}/{}.csv.gz",
        date.year(),
        date.month(),
        date.format("%Y-%m-%d")
    ))
}
