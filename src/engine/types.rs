//! Engine types
//!
//! Pages, parent links and run reporting for the sync engine.

use super::report::PollSettings;
use crate::config::TapConfig;
use crate::error::Error;
use crate::types::{value_to_id, ProfileId};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One decoded response of a collection fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number within the fetch sequence
    pub number: u32,
    /// Records extracted from the response
    pub records: Vec<Value>,
    /// Full response body
    pub raw: Value,
}

/// Parent-id filter injected into every request of a fetch sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ParentFilter {
    /// Request body field
    pub field: String,
    /// Field value
    pub value: Value,
}

/// A parent record and the identifier children are filtered by
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRecord {
    /// The record as returned by the API
    pub record: Value,
    /// Value of the linking field, rendered as a string
    pub link: Option<String>,
}

impl ParentRecord {
    /// Wrap a record, reading its link from `id_field`
    pub fn new(record: Value, id_field: Option<&str>) -> Self {
        let link = id_field
            .and_then(|field| record.get(field))
            .and_then(value_to_id);
        Self { record, link }
    }
}

/// Records of one child page after the referential check
#[derive(Debug, Clone, PartialEq)]
pub struct ChildPage {
    /// 0-based batch index
    pub batch: usize,
    /// Page number within the batch
    pub page: u32,
    /// Records whose parent id belongs to the batch
    pub records: Vec<Value>,
    /// Records dropped for carrying a foreign parent id
    pub dropped: u64,
}

// ============================================================================
// Options
// ============================================================================

/// Tuning used by the sync engine
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// `maxResults` per list request
    pub page_size: u32,
    /// Parent ids per scoped child request
    pub parent_filter_batch_size: usize,
    /// Profiles processed concurrently
    pub max_concurrent_profiles: usize,
    /// Report lookback from today
    pub report_lookback_days: u32,
    /// Days per report request
    pub report_window_days: u32,
    /// Earliest report date
    pub start_date: Option<DateTime<Utc>>,
    /// Report status polling
    pub poll: PollSettings,
}

impl SyncOptions {
    /// Options from the tap configuration
    pub fn from_config(config: &TapConfig) -> Self {
        Self {
            page_size: config.page_size,
            parent_filter_batch_size: config.parent_filter_batch_size,
            max_concurrent_profiles: config.max_concurrent_profiles,
            report_lookback_days: config.report_lookback_days,
            report_window_days: config.report_window_days,
            start_date: config.start_date,
            poll: config.poll_settings(),
        }
    }

    /// Override report polling
    #[must_use]
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }
}

// ============================================================================
// Run Reporting
// ============================================================================

/// Statistics from a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Records written to the sink
    pub records_emitted: u64,
    /// Responses consumed (list pages and report downloads)
    pub pages_fetched: u64,
    /// Parent-id batches issued by child streams
    pub child_batches: u64,
    /// Child records dropped by the referential check
    pub records_dropped: u64,
    /// Report windows downloaded
    pub reports_downloaded: u64,
    /// Profile/stream pairs that completed
    pub streams_completed: u64,
    /// Profile/stream pairs that failed
    pub streams_failed: u64,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another worker's counters into these
    pub fn merge(&mut self, other: &SyncStats) {
        self.records_emitted += other.records_emitted;
        self.pages_fetched += other.pages_fetched;
        self.child_batches += other.child_batches;
        self.records_dropped += other.records_dropped;
        self.reports_downloaded += other.reports_downloaded;
        self.streams_completed += other.streams_completed;
        self.streams_failed += other.streams_failed;
    }
}

/// A profile/stream pair that did not complete
#[derive(Debug)]
pub struct StreamFailure {
    /// Profile the stream ran for
    pub profile_id: ProfileId,
    /// Stream name
    pub stream: String,
    /// What went wrong
    pub error: Error,
}

/// Outcome of a sync run that was not aborted
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Counters
    pub stats: SyncStats,
    /// Stream-scoped failures
    pub failures: Vec<StreamFailure>,
    /// Whether the run stopped early on a shutdown signal
    pub cancelled: bool,
}

impl SyncReport {
    /// True when every selected stream completed for every profile
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Failure recorded for one profile/stream pair
    pub fn failure(&self, profile_id: &str, stream: &str) -> Option<&StreamFailure> {
        self.failures
            .iter()
            .find(|f| f.profile_id.as_str() == profile_id && f.stream == stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parent_record_link() {
        let record = ParentRecord::new(json!({"campaignId": 123, "name": "A"}), Some("campaignId"));
        assert_eq!(record.link.as_deref(), Some("123"));

        let record = ParentRecord::new(json!({"name": "A"}), Some("campaignId"));
        assert!(record.link.is_none());

        let record = ParentRecord::new(json!({"campaignId": "C1"}), None);
        assert!(record.link.is_none());
    }

    #[test]
    fn test_stats_merge() {
        let mut total = SyncStats::new();
        let worker = SyncStats {
            records_emitted: 5,
            pages_fetched: 2,
            records_dropped: 1,
            streams_completed: 3,
            ..SyncStats::default()
        };
        total.merge(&worker);
        total.merge(&worker);
        assert_eq!(total.records_emitted, 10);
        assert_eq!(total.pages_fetched, 4);
        assert_eq!(total.records_dropped, 2);
        assert_eq!(total.streams_completed, 6);
    }

    #[test]
    fn test_report_success() {
        let mut report = SyncReport::default();
        assert!(report.is_success());

        report.failures.push(StreamFailure {
            profile_id: ProfileId::new("1"),
            stream: "keywords".to_string(),
            error: Error::RateLimitExceeded { attempts: 3 },
        });
        assert!(!report.is_success());
        assert!(report.failure("1", "keywords").is_some());
        assert!(report.failure("2", "keywords").is_none());
    }
}
