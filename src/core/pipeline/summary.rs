//! Per-date outcomes and the run summary

use crate::core::object_key::ObjectKey;
use crate::domain::{BackfillError, ErrorKind, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Progress of one date through the pipeline
///
/// `Pending -> Extracted -> Deduplicated -> Merged` on success; any stage
/// may end in `Failed`, or `Cancelled` when shutdown interrupted the date.
/// `Skipped` dates were already recorded as merged and were not fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStage {
    Pending,
    Extracted,
    Deduplicated,
    Merged,
    Skipped,
    Failed,
    Cancelled,
}

impl DateStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DateStage::Merged | DateStage::Skipped | DateStage::Failed | DateStage::Cancelled
        )
    }
}

impl std::fmt::Display for DateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DateStage::Pending => "pending",
            DateStage::Extracted => "extracted",
            DateStage::Deduplicated => "deduplicated",
            DateStage::Merged => "merged",
            DateStage::Skipped => "skipped",
            DateStage::Failed => "failed",
            DateStage::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of processing one date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateOutcome {
    pub date: NaiveDate,
    pub object_key: ObjectKey,
    pub stage: DateStage,

    /// Last stage reached before the date failed or was cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateStage>,

    pub records_extracted: usize,
    pub duplicates_removed: usize,
    pub rows_merged: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,
}

impl DateOutcome {
    pub fn pending(date: NaiveDate, object_key: ObjectKey) -> Self {
        Self {
            date,
            object_key,
            stage: DateStage::Pending,
            failed_at: None,
            records_extracted: 0,
            duplicates_removed: 0,
            rows_merged: 0,
            error_kind: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Move to the next successful stage; terminal outcomes don't move
    pub fn advance(&mut self, stage: DateStage) {
        if !self.stage.is_terminal() {
            self.stage = stage;
        }
    }

    /// Record `err` as the reason this date stopped
    pub fn fail(&mut self, err: &BackfillError) {
        let kind = ErrorKind::from(err);
        self.failed_at = Some(self.stage);
        self.stage = if kind == ErrorKind::Cancelled {
            DateStage::Cancelled
        } else {
            DateStage::Failed
        };
        self.error_kind = Some(kind);
        self.error = Some(err.to_string());
    }

    pub fn is_merged(&self) -> bool {
        self.stage == DateStage::Merged
    }

    /// Merged now or skipped as merged earlier
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, DateStage::Merged | DateStage::Skipped)
    }
}

/// Summary of one backfill run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dry_run: bool,

    /// Shutdown was requested before the run finished
    pub interrupted: bool,

    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,

    /// One entry per date, in date order
    pub outcomes: Vec<DateOutcome>,
}

impl RunSummary {
    pub fn new(run_id: Uuid, start_date: NaiveDate, end_date: NaiveDate, dry_run: bool) -> Self {
        Self {
            run_id,
            start_date,
            end_date,
            dry_run,
            interrupted: false,
            started_at: Utc::now(),
            duration_ms: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn total_dates(&self) -> usize {
        self.outcomes.len()
    }

    pub fn merged_dates(&self) -> usize {
        self.count(DateStage::Merged)
    }

    pub fn skipped_dates(&self) -> usize {
        self.count(DateStage::Skipped)
    }

    pub fn failed_dates(&self) -> usize {
        self.count(DateStage::Failed)
    }

    pub fn cancelled_dates(&self) -> usize {
        self.count(DateStage::Cancelled)
    }

    fn count(&self, stage: DateStage) -> usize {
        self.outcomes.iter().filter(|o| o.stage == stage).count()
    }

    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records_extracted).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.outcomes.iter().map(|o| o.duplicates_removed).sum()
    }

    pub fn total_rows_merged(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_merged).sum()
    }

    /// Outcomes that ended neither `Merged` nor `Skipped`
    pub fn unmerged(&self) -> impl Iterator<Item = &DateOutcome> {
        self.outcomes.iter().filter(|o| !o.is_complete())
    }

    /// True iff every date was merged, now or by an earlier run
    pub fn is_successful(&self) -> bool {
        !self.interrupted && self.outcomes.iter().all(DateOutcome::is_complete)
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            start_date = %self.start_date,
            end_date = %self.end_date,
            dates = self.total_dates(),
            merged = self.merged_dates(),
            skipped = self.skipped_dates(),
            failed = self.failed_dates(),
            cancelled = self.cancelled_dates(),
            records = self.total_records(),
            duplicates_removed = self.total_duplicates(),
            rows_merged = self.total_rows_merged(),
            duration_ms = self.duration_ms,
            dry_run = self.dry_run,
            interrupted = self.interrupted,
            "Backfill completed"
        );

        for outcome in self.outcomes.iter().filter(|o| o.stage == DateStage::Failed) {
            tracing::warn!(
                date = %outcome.date,
                object_key = %outcome.object_key,
                stage = ?outcome.failed_at,
                error_kind = ?outcome.error_kind,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Date failed"
            );
        }
    }

    /// Write the summary as pretty JSON
    pub fn write_report(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
