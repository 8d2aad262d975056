//! Inclusive calendar date ranges
//!
//! [`date_range`] is the entry point of every run: it validates the requested
//! bounds and yields each calendar day once, in ascending order.

use crate::domain::{BackfillError, Result};
use chrono::{Days, NaiveDate};

/// Ordered, inclusive sequence of dates with a step of one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of dates in the range, always at least one
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Always false: an empty range cannot be constructed
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> DateRangeIter {
        DateRangeIter {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl IntoIterator for &DateRange {
    type Item = NaiveDate;
    type IntoIter = DateRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`DateRange`]
#[derive(Debug, Clone)]
pub struct DateRangeIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateRangeIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current < self.end {
            current.checked_add_days(Days::new(1))
        } else {
            None
        };
        Some(current)
    }
}

/// Builds the inclusive range `start..=end`
///
/// # Errors
///
/// Returns [`BackfillError::InvalidRange`] if `start` is after `end`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use trade_backfill::core::calendar::date_range;
///
/// let start = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
///
/// let dates: Vec<_> = date_range(start, end).unwrap().iter().collect();
/// assert_eq!(dates.len(), 3); // 2024 is a leap year
/// ```
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange> {
    if start > end {
        return Err(BackfillError::InvalidRange { start, end });
    }
    Ok(DateRange { start, end })
}
