//! SQL text for the trades relation and its staging tables
//!
//! Table names are interpolated, so callers must pass identifiers that
//! passed [`crate::config::is_sql_identifier`].

/// Column list shared by the COPY and the merge, in TradeRecord field order
pub const TRADE_COLUMNS: &str =
    "ticker, condition_id, exchange_id, trade_id, \"timestamp\", price, size";

pub fn create_target_table(target: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {target} (
            ticker TEXT NOT NULL,
            condition_id INTEGER NOT NULL,
            exchange_id INTEGER NOT NULL,
            trade_id INTEGER NOT NULL,
            \"timestamp\" BIGINT NOT NULL,
            price DOUBLE PRECISION NOT NULL,
            size DOUBLE PRECISION NOT NULL,
            PRIMARY KEY (ticker, trade_id)
        )"
    )
}

/// Replaces any leftover staging table with an empty, unlogged copy of the
/// target's columns (no constraints, no indexes)
pub fn create_staging_table(staging: &str, target: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {staging};
         CREATE UNLOGGED TABLE {staging} (LIKE {target} INCLUDING DEFAULTS)"
    )
}

pub fn copy_into(staging: &str) -> String {
    format!("COPY {staging} ({TRADE_COLUMNS}) FROM STDIN BINARY")
}

/// Insert-or-overwrite keyed on `(ticker, trade_id)`
pub fn merge_into(staging: &str, target: &str) -> String {
    format!(
        "INSERT INTO {target} ({TRADE_COLUMNS})
         SELECT {TRADE_COLUMNS} FROM {staging}
         ON CONFLICT (ticker, trade_id) DO UPDATE SET
            condition_id = EXCLUDED.condition_id,
            exchange_id = EXCLUDED.exchange_id,
            \"timestamp\" = EXCLUDED.\"timestamp\",
            price = EXCLUDED.price,
            size = EXCLUDED.size"
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

/// One row per merged date
pub fn create_loaded_dates_table(ledger: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {ledger} (
            trade_date DATE PRIMARY KEY,
            rows_merged BIGINT NOT NULL,
            merged_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )"
    )
}

/// `$1` date, `$2` rows merged
pub fn record_loaded_date(ledger: &str) -> String {
    format!(
        "INSERT INTO {ledger} (trade_date, rows_merged) VALUES ($1, $2)
         ON CONFLICT (trade_date) DO UPDATE SET
            rows_merged = EXCLUDED.rows_merged,
            merged_at = now()"
    )
}

/// `$1`..=`$2` inclusive
pub fn select_loaded_dates(ledger: &str) -> String {
    format!(
        "SELECT trade_date FROM {ledger}
         WHERE trade_date BETWEEN $1 AND $2
         ORDER BY trade_date"
    )
}

/// `$1` table name; NULL when the table does not exist
pub const TABLE_EXISTS: &str = "SELECT to_regclass($1)::text";
