//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use chrono::{Duration, NaiveDate};

/// Date format used by the reporting API
const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Batch Router
// ============================================================================

/// Parent-id batch router
///
/// Splits an ordered list of parent ids into consecutive batches of at most
/// `cap` ids. N ids always yield exactly ⌈N/cap⌉ batches; order is preserved
/// and no id is dropped or repeated.
#[derive(Debug, Clone)]
pub struct BatchRouter {
    /// Parent ids in upstream order
    ids: Vec<String>,
    /// Maximum ids per batch
    cap: usize,
}

impl BatchRouter {
    /// Create a new batch router; a zero cap is treated as one
    pub fn new(ids: Vec<String>, cap: usize) -> Self {
        Self {
            ids,
            cap: cap.max(1),
        }
    }

    /// The batches as id lists
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.ids.chunks(self.cap).map(<[String]>::to_vec).collect()
    }

    /// Number of batches (and therefore scoped requests)
    pub fn batch_count(&self) -> usize {
        self.ids.len().div_ceil(self.cap)
    }
}

// ============================================================================
// Date Window Router
// ============================================================================

/// Inclusive date range of one report request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    /// First day
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateWindow {
    /// `startDate` value
    pub fn start_str(&self) -> String {
        self.start.format(REPORT_DATE_FORMAT).to_string()
    }

    /// `endDate` value
    pub fn end_str(&self) -> String {
        self.end.format(REPORT_DATE_FORMAT).to_string()
    }
}

/// Report date window router
///
/// Slices the inclusive range `[start, end]` into consecutive windows of at
/// most `window_days` days.
#[derive(Debug, Clone)]
pub struct DateWindowRouter {
    start: NaiveDate,
    end: NaiveDate,
    window_days: u32,
}

impl DateWindowRouter {
    /// Create a new date window router; a zero window is treated as one day
    pub fn new(start: NaiveDate, end: NaiveDate, window_days: u32) -> Self {
        Self {
            start,
            end,
            window_days: window_days.max(1),
        }
    }

    /// Windows in chronological order; empty when `start > end`
    pub fn windows(&self) -> Vec<DateWindow> {
        let span = Duration::days(i64::from(self.window_days) - 1);
        let mut windows = Vec::new();
        let mut current = self.start;

        while current <= self.end {
            let window_end = std::cmp::min(current + span, self.end);
            windows.push(DateWindow {
                start: current,
                end: window_end,
            });
            current = window_end + Duration::days(1);
        }

        windows
    }
}
