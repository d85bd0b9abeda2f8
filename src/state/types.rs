//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Complete state for the tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// stream name -> profile id -> bookmark
    #[serde(default)]
    pub bookmarks: BTreeMap<String, BTreeMap<String, Bookmark>>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bookmark of one stream for one profile
    pub fn bookmark(&self, stream: &str, profile_id: &str) -> Option<&Bookmark> {
        self.bookmarks.get(stream)?.get(profile_id)
    }

    /// Get a mutable bookmark, creating it if needed
    pub fn bookmark_mut(&mut self, stream: &str, profile_id: &str) -> &mut Bookmark {
        self.bookmarks
            .entry(stream.to_string())
            .or_default()
            .entry(profile_id.to_string())
            .or_default()
    }

    /// Get the replication cursor of one stream for one profile
    pub fn cursor(&self, stream: &str, profile_id: &str) -> Option<&str> {
        self.bookmark(stream, profile_id)?.cursor.as_deref()
    }
}

/// Replication progress of one stream for one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Replication-key high-water mark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    /// Completion time of the last full-table pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    /// Move the cursor forward. Returns `false` (and leaves the cursor alone)
    /// when `value` is not newer than the stored one.
    pub fn advance_cursor(&mut self, value: &str) -> bool {
        let newer = match &self.cursor {
            Some(current) => compare_cursors(value, current) == Ordering::Greater,
            None => true,
        };
        if newer {
            self.cursor = Some(value.to_string());
        }
        newer
    }

    /// Record a completed full-table pass, never moving backwards
    pub fn mark_synced(&mut self, at: DateTime<Utc>) -> bool {
        if self.synced_at.is_some_and(|current| at <= current) {
            return false;
        }
        self.synced_at = Some(at);
        true
    }
}

/// Order two replication-key values.
///
/// Dates and RFC 3339 timestamps are compared chronologically (`2024-05-01`
/// sorts before `2024-05-01T10:00:00Z`); anything else lexically.
pub fn compare_cursors(a: &str, b: &str) -> Ordering {
    match (parse_instant(a), parse_instant(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
