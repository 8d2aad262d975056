//! PostgreSQL adapter implementing the trade store trait

use crate::adapters::database::traits::TradeStore;
use crate::adapters::postgresql::client::{map_pg_error, PostgreSQLClient};
use crate::adapters::postgresql::sql;
use crate::domain::{Result, TradeRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::pin_mut;
use std::sync::Arc;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::{ToSql, Type};

/// Column types of the binary COPY, matching [`sql::TRADE_COLUMNS`]
const COPY_TYPES: [Type; 7] = [
    Type::TEXT,
    Type::INT4,
    Type::INT4,
    Type::INT4,
    Type::INT8,
    Type::FLOAT8,
    Type::FLOAT8,
];

/// PostgreSQL implementation of [`TradeStore`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl TradeStore for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self, target: &str) -> Result<()> {
        let client = self.client.get_connection().await?;
        client
            .batch_execute(&sql::create_target_table(target))
            .await
            .map_err(|e| map_pg_error("Failed to create target table", e))?;

        tracing::debug!(table = target, "Target table ready");
        Ok(())
    }

    async fn create_staging(&self, staging: &str, target: &str) -> Result<()> {
        let client = self.client.get_connection().await?;
        client
            .batch_execute(&sql::create_staging_table(staging, target))
            .await
            .map_err(|e| map_pg_error("CREATE staging failed", e))
    }

    async fn load_staging(&self, staging: &str, records: &[TradeRecord]) -> Result<u64> {
        let client = self.client.get_connection().await?;
        let statement = sql::copy_into(staging);
        let sink = client
            .copy_in(statement.as_str())
            .await
            .map_err(|e| map_pg_error("COPY failed to start", e))?;

        let writer = BinaryCopyInWriter::new(sink, &COPY_TYPES);
        pin_mut!(writer);

        for record in records {
            let row: [&(dyn ToSql + Sync); 7] = [
                &record.ticker,
                &record.condition_id,
                &record.exchange_id,
                &record.trade_id,
                &record.timestamp,
                &record.price,
                &record.size,
            ];
            writer
                .as_mut()
                .write(&row)
                .await
                .map_err(|e| map_pg_error("COPY row failed", e))?;
        }

        writer
            .finish()
            .await
            .map_err(|e| map_pg_error("COPY failed to finish", e))
    }

    async fn merge_staging(&self, staging: &str, target: &str) -> Result<u64> {
        let mut client = self.client.get_connection().await?;
        let transaction = client
            .transaction()
            .await
            .map_err(|e| map_pg_error("BEGIN failed", e))?;

        // Dropping the transaction before commit rolls it back
        let statement = sql::merge_into(staging, target);
        let merged = transaction
            .execute(statement.as_str(), &[])
            .await
            .map_err(|e| map_pg_error("MERGE failed", e))?;

        transaction
            .commit()
            .await
            .map_err(|e| map_pg_error("COMMIT failed", e))?;

        Ok(merged)
    }

    async fn drop_staging(&self, staging: &str) -> Result<()> {
        let client = self.client.get_connection().await?;
        client
            .batch_execute(&sql::drop_table(staging))
            .await
            .map_err(|e| map_pg_error("DROP staging failed", e))
    }

    async fn ensure_loaded_dates(&self, ledger: &str) -> Result<()> {
        let client = self.client.get_connection().await?;
        client
            .batch_execute(&sql::create_loaded_dates_table(ledger))
            .await
            .map_err(|e| map_pg_error("Failed to create loaded dates table", e))
    }

    async fn record_loaded_date(&self, ledger: &str, date: NaiveDate, rows: u64) -> Result<()> {
        let client = self.client.get_connection().await?;
        let rows = i64::try_from(rows).unwrap_or(i64::MAX);
        client
            .execute(sql::record_loaded_date(ledger).as_str(), &[&date, &rows])
            .await
            .map_err(|e| map_pg_error("Failed to record loaded date", e))?;
        Ok(())
    }

    async fn loaded_dates(
        &self,
        ledger: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let client = self.client.get_connection().await?;

        let exists: Option<String> = client
            .query_one(sql::TABLE_EXISTS, &[&ledger])
            .await
            .map_err(|e| map_pg_error("Failed to look up loaded dates table", e))?
            .get(0);
        if exists.is_none() {
            return Ok(Vec::new());
        }

        let rows = client
            .query(sql::select_loaded_dates(ledger).as_str(), &[&start, &end])
            .await
            .map_err(|e| map_pg_error("Failed to read loaded dates", e))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn close(&self) {
        self.client.close();
        tracing::debug!("PostgreSQL pool closed");
    }

    fn describe(&self) -> String {
        self.client.connection_string_safe()
    }
}
