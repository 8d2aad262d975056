//! Trade record domain model
//!
//! A [`TradeRecord`] is one row of a daily trades flat file, projected onto
//! the column names of the `trades` table. Records are immutable values;
//! the pair `(ticker, trade_id)` is the natural key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural key of a trade: `(ticker, trade_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeKey {
    pub ticker: String,
    pub trade_id: i32,
}

impl TradeKey {
    pub fn new(ticker: impl Into<String>, trade_id: i32) -> Self {
        Self {
            ticker: ticker.into(),
            trade_id,
        }
    }
}

impl fmt::Display for TradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ticker, self.trade_id)
    }
}

/// One trade, as persisted in the target relation
///
/// # Examples
///
/// ```
/// use trade_backfill::domain::TradeRecord;
///
/// let trade = TradeRecord {
///     ticker: "X:BTC-USD".to_string(),
///     condition_id: 1,
///     exchange_id: 4,
///     trade_id: 1001,
///     timestamp: 1_704_067_200_000_000_000,
///     price: 42_250.5,
///     size: 0.015,
/// };
///
/// assert_eq!(trade.key().to_string(), "X:BTC-USD#1001");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Instrument ticker, e.g. `X:BTC-USD`
    pub ticker: String,

    /// Trade condition code (`conditions` upstream)
    pub condition_id: i32,

    /// Exchange identifier (`exchange` upstream)
    pub exchange_id: i32,

    /// Trade identifier, unique per ticker (`id` upstream)
    pub trade_id: i32,

    /// Participant timestamp, in the epoch unit used upstream
    pub timestamp: i64,

    pub price: f64,

    pub size: f64,
}

impl TradeRecord {
    /// Returns the natural key of this record
    pub fn key(&self) -> TradeKey {
        TradeKey::new(self.ticker.clone(), self.trade_id)
    }
}
