//! Natural-key deduplication of one date's batch

use crate::domain::{TradeKey, TradeRecord};
use std::collections::HashMap;

/// A batch with at most one record per `(ticker, trade_id)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupedBatch {
    pub records: Vec<TradeRecord>,

    /// Records dropped because a later record shared their key
    pub duplicates_removed: usize,
}

/// Collapses records sharing a natural key
///
/// The record encountered last wins. Output order follows the first
/// occurrence of each key, so an input without repeated keys is returned
/// unchanged.
///
/// # Examples
///
/// ```
/// use trade_backfill::core::dedup::deduplicate;
/// use trade_backfill::domain::TradeRecord;
///
/// let trade = |price: f64| TradeRecord {
///     ticker: "X:BTC-USD".to_string(),
///     condition_id: 1,
///     exchange_id: 1,
///     trade_id: 7,
///     timestamp: 0,
///     price,
///     size: 1.0,
/// };
///
/// let batch = deduplicate(vec![trade(100.0), trade(101.0)]);
/// assert_eq!(batch.records.len(), 1);
/// assert_eq!(batch.records[0].price, 101.0);
/// assert_eq!(batch.duplicates_removed, 1);
/// ```
pub fn deduplicate(records: Vec<TradeRecord>) -> DedupedBatch {
    let input_len = records.len();
    let mut positions: HashMap<TradeKey, usize> = HashMap::with_capacity(input_len);
    let mut output: Vec<TradeRecord> = Vec::with_capacity(input_len);

    for record in records {
        match positions.get(&record.key()) {
            Some(&index) => output[index] = record,
            None => {
                positions.insert(record.key(), output.len());
                output.push(record);
            }
        }
    }

    DedupedBatch {
        duplicates_removed: input_len - output.len(),
        records: output,
    }
}
