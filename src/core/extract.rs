//! Extraction of one date's gzip CSV object into trade records
//!
//! The upstream file layout is fixed and positional:
//!
//! | # | column                  | type   | field          |
//! |---|-------------------------|--------|----------------|
//! | 0 | `ticker`                | string | `ticker`       |
//! | 1 | `conditions`            | int32  | `condition_id` |
//! | 2 | `exchange`              | int32  | `exchange_id`  |
//! | 3 | `id`                    | int32  | `trade_id`     |
//! | 4 | `participant_timestamp` | int64  | `timestamp`    |
//! | 5 | `price`                 | f64    | `price`        |
//! | 6 | `size`                  | f64    | `size`         |
//!
//! The first row is a header and is skipped. Any row with a different
//! arity or a value that does not parse fails the whole object.

use crate::adapters::storage::ObjectStore;
use crate::core::object_key::ObjectKey;
use crate::core::pipeline::ShutdownSignal;
use crate::core::retry::RetryPolicy;
use crate::domain::{BackfillError, ExtractionError, Result, StorageError, TradeRecord};
use flate2::read::MultiGzDecoder;
use std::str::FromStr;
use std::sync::Arc;

/// Number of columns in a trades flat file
pub const COLUMN_COUNT: usize = 7;

/// Fetches objects and turns them into [`TradeRecord`]s
pub struct RecordExtractor {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl RecordExtractor {
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Fetch, decompress and parse the object under `key`
    ///
    /// Transient fetch failures are retried. Decoding runs on the blocking
    /// thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`BackfillError::Extraction`] for a missing object, a failed
    /// fetch, an undecompressable payload or a schema violation.
    pub async fn extract(
        &self,
        key: &ObjectKey,
        shutdown: &ShutdownSignal,
    ) -> Result<Vec<TradeRecord>> {
        let store = &self.store;
        let path = key.as_str();

        let payload = self
            .retry
            .run("fetch object", shutdown, move || async move {
                store
                    .get_object(path)
                    .await
                    .map_err(|e| BackfillError::from(fetch_error(e)))
            })
            .await?;

        tracing::debug!(object_key = %key, bytes = payload.len(), "Decoding object");

        let records = tokio::task::spawn_blocking(move || parse_trades(&payload))
            .await
            .map_err(|e| BackfillError::Other(format!("Decoding task failed: {e}")))??;

        Ok(records)
    }
}

fn fetch_error(err: StorageError) -> ExtractionError {
    match err {
        StorageError::NotFound(key) => ExtractionError::ObjectNotFound(key),
        StorageError::Request(message) => ExtractionError::Fetch(message),
    }
}

/// Decompress a gzip payload and parse every data row
///
/// Concatenated gzip members are read as one stream.
///
/// # Errors
///
/// [`ExtractionError::Decompression`] if the payload is not valid gzip,
/// [`ExtractionError::Schema`] for a missing header, a wrong arity or an
/// untypeable value.
pub fn parse_trades(payload: &[u8]) -> std::result::Result<Vec<TradeRecord>, ExtractionError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(MultiGzDecoder::new(payload));

    let header = reader.headers().map_err(|e| csv_error(e, 1))?;
    if header.is_empty() {
        return Err(ExtractionError::Schema {
            line: 1,
            message: "missing header row".to_string(),
        });
    }
    if header.len() != COLUMN_COUNT {
        return Err(ExtractionError::Schema {
            line: 1,
            message: format!(
                "header has {} columns, expected {COLUMN_COUNT}",
                header.len()
            ),
        });
    }

    let mut records = Vec::new();
    let mut row = csv::StringRecord::new();
    loop {
        let last_line = reader.position().line();
        match reader.read_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => return Err(csv_error(e, last_line + 1)),
        }

        let line = row.position().map(|p| p.line()).unwrap_or(last_line + 1);
        records.push(parse_row(&row, line)?);
    }

    Ok(records)
}

fn parse_row(
    row: &csv::StringRecord,
    line: u64,
) -> std::result::Result<TradeRecord, ExtractionError> {
    if row.len() != COLUMN_COUNT {
        return Err(ExtractionError::Schema {
            line,
            message: format!("expected {COLUMN_COUNT} fields, found {}", row.len()),
        });
    }

    let ticker = row[0].trim();
    if ticker.is_empty() {
        return Err(ExtractionError::Schema {
            line,
            message: "empty ticker".to_string(),
        });
    }

    Ok(TradeRecord {
        ticker: ticker.to_string(),
        condition_id: parse_field(row, 1, "conditions", line)?,
        exchange_id: parse_field(row, 2, "exchange", line)?,
        trade_id: parse_field(row, 3, "id", line)?,
        timestamp: parse_field(row, 4, "participant_timestamp", line)?,
        price: parse_field(row, 5, "price", line)?,
        size: parse_field(row, 6, "size", line)?,
    })
}

fn parse_field<T: FromStr>(
    row: &csv::StringRecord,
    index: usize,
    column: &str,
    line: u64,
) -> std::result::Result<T, ExtractionError> {
    let raw = row[index].trim();
    raw.parse().map_err(|_| ExtractionError::Schema {
        line,
        message: format!("invalid {column} '{raw}'"),
    })
}

fn csv_error(err: csv::Error, line: u64) -> ExtractionError {
    match err.kind() {
        csv::ErrorKind::Io(io) => ExtractionError::Decompression(io.to_string()),
        _ => ExtractionError::Schema {
            line: err.position().map(|p| p.line()).unwrap_or(line),
            message: err.to_string(),
        },
    }
}
