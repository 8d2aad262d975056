//! Shared fixtures for integration tests: in-memory stores and gzip payloads

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use trade_backfill::adapters::database::TradeStore;
use trade_backfill::adapters::storage::ObjectStore;
use trade_backfill::config::BackfillConfig;
use trade_backfill::core::object_key;
use trade_backfill::domain::{BackfillError, Result, StorageError, TradeRecord};

pub const HEADER: &str = "ticker,conditions,exchange,id,participant_timestamp,price,size";

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Gzip-compress a header plus `rows`
pub fn gzip_csv(rows: &[&str]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    writeln!(encoder, "{HEADER}").unwrap();
    for row in rows {
        writeln!(encoder, "{row}").unwrap();
    }
    Bytes::from(encoder.finish().unwrap())
}

/// Configuration with fast retries and no credentials
pub fn test_config() -> BackfillConfig {
    let mut config = BackfillConfig::default();
    config.pipeline.retry.max_retries = 2;
    config.pipeline.retry.initial_delay_ms = 1;
    config.pipeline.retry.max_delay_ms = 5;
    config
}

/// Object store backed by a map of keys to payloads
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    transient_failures: Mutex<HashMap<String, usize>>,
    pub get_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payload` under the resolved key of `date`
    pub fn put_date(&self, date: NaiveDate, payload: Bytes) {
        self.objects
            .lock()
            .unwrap()
            .insert(object_key::resolve(date).to_string(), payload);
    }

    /// Fail the next `times` GETs of `date` with a retryable error
    pub fn fail_date(&self, date: NaiveDate, times: usize) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(object_key::resolve(date).to_string(), times);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_object(&self, key: &str) -> std::result::Result<Bytes, StorageError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(remaining) = self.transient_failures.lock().unwrap().get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::Request("503 Slow Down".to_string()));
            }
        }

        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn object_exists(&self, key: &str) -> std::result::Result<bool, StorageError> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    fn describe(&self) -> String {
        "memory://objects".to_string()
    }
}

/// Relational store that keeps the target table keyed by `(ticker, trade_id)`
///
/// A merge of a staging table holding the same key twice fails the way
/// `ON CONFLICT DO UPDATE` does.
#[derive(Default)]
pub struct InMemoryTradeStore {
    target: Mutex<BTreeMap<(String, i32), TradeRecord>>,
    staging: Mutex<HashMap<String, Vec<TradeRecord>>>,
    loaded_dates: Mutex<BTreeMap<NaiveDate, u64>>,
    schema_ready: Mutex<bool>,
    unreachable: bool,
    failing_loads: Mutex<HashSet<String>>,
    lost_after_load: Mutex<HashSet<String>>,
    load_delay: Option<Duration>,
    shutdown_after_merge: Mutex<Option<watch::Sender<bool>>>,
    pub dropped: Mutex<Vec<String>>,
    pub merge_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose connection test fails
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Sleep inside every load to make dates overlap
    pub fn with_load_delay(delay: Duration) -> Self {
        Self {
            load_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail every load into `staging` with a permanent error
    pub fn fail_load_of(&self, staging: &str) {
        self.failing_loads.lock().unwrap().insert(staging.to_string());
    }

    /// The next load into `staging` lands, then the connection is lost
    pub fn lose_connection_after_load_of(&self, staging: &str) {
        self.lost_after_load.lock().unwrap().insert(staging.to_string());
    }

    /// Request shutdown once the first merge commits
    pub fn request_shutdown_after_merge(&self, tx: watch::Sender<bool>) {
        *self.shutdown_after_merge.lock().unwrap() = Some(tx);
    }

    pub fn rows(&self) -> Vec<TradeRecord> {
        self.target.lock().unwrap().values().cloned().collect()
    }

    pub fn row(&self, ticker: &str, trade_id: i32) -> Option<TradeRecord> {
        self.target
            .lock()
            .unwrap()
            .get(&(ticker.to_string(), trade_id))
            .cloned()
    }

    pub fn staging_tables(&self) -> Vec<String> {
        self.staging.lock().unwrap().keys().cloned().collect()
    }

    pub fn schema_ready(&self) -> bool {
        *self.schema_ready.lock().unwrap()
    }

    /// Dates recorded as merged, with their row counts
    pub fn loaded(&self) -> Vec<(NaiveDate, u64)> {
        self.loaded_dates
            .lock()
            .unwrap()
            .iter()
            .map(|(date, rows)| (*date, *rows))
            .collect()
    }

    /// Pretend an earlier run merged `date`
    pub fn mark_loaded(&self, date: NaiveDate) {
        self.loaded_dates.lock().unwrap().insert(date, 0);
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn test_connection(&self) -> Result<()> {
        if self.unreachable {
            return Err(BackfillError::Connection(
                "connection refused (os error 111)".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_schema(&self, _target: &str) -> Result<()> {
        *self.schema_ready.lock().unwrap() = true;
        Ok(())
    }

    async fn create_staging(&self, staging: &str, target: &str) -> Result<()> {
        if !self.schema_ready() {
            return Err(BackfillError::Database(format!(
                "relation \"{target}\" does not exist"
            )));
        }
        self.staging
            .lock()
            .unwrap()
            .insert(staging.to_string(), Vec::new());
        Ok(())
    }

    async fn load_staging(&self, staging: &str, records: &[TradeRecord]) -> Result<u64> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_loads.lock().unwrap().contains(staging) {
            return Err(BackfillError::Database(format!(
                "COPY into {staging} failed: invalid input syntax"
            )));
        }

        let mut tables = self.staging.lock().unwrap();
        let table = tables.get_mut(staging).ok_or_else(|| {
            BackfillError::Database(format!("relation \"{staging}\" does not exist"))
        })?;
        table.extend_from_slice(records);

        if self.lost_after_load.lock().unwrap().remove(staging) {
            return Err(BackfillError::Connection(
                "connection closed after COPY".to_string(),
            ));
        }
        Ok(records.len() as u64)
    }

    async fn merge_staging(&self, staging: &str, _target: &str) -> Result<u64> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);

        let rows = self
            .staging
            .lock()
            .unwrap()
            .get(staging)
            .cloned()
            .ok_or_else(|| {
                BackfillError::Database(format!("relation \"{staging}\" does not exist"))
            })?;

        let mut seen = HashSet::new();
        for row in &rows {
            if !seen.insert((row.ticker.clone(), row.trade_id)) {
                return Err(BackfillError::Database(
                    "ON CONFLICT DO UPDATE command cannot affect row a second time".to_string(),
                ));
            }
        }

        let mut target = self.target.lock().unwrap();
        for row in &rows {
            target.insert((row.ticker.clone(), row.trade_id), row.clone());
        }
        drop(target);

        if let Some(tx) = self.shutdown_after_merge.lock().unwrap().take() {
            let _ = tx.send(true);
        }

        Ok(rows.len() as u64)
    }

    async fn drop_staging(&self, staging: &str) -> Result<()> {
        self.staging.lock().unwrap().remove(staging);
        self.dropped.lock().unwrap().push(staging.to_string());
        Ok(())
    }

    async fn ensure_loaded_dates(&self, _ledger: &str) -> Result<()> {
        Ok(())
    }

    async fn record_loaded_date(&self, _ledger: &str, date: NaiveDate, rows: u64) -> Result<()> {
        self.loaded_dates.lock().unwrap().insert(date, rows);
        Ok(())
    }

    async fn loaded_dates(
        &self,
        _ledger: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        Ok(self
            .loaded_dates
            .lock()
            .unwrap()
            .range(start..=end)
            .map(|(date, _)| *date)
            .collect())
    }

    fn describe(&self) -> String {
        "memory://trades".to_string()
    }
}
