//! Asynchronous report runner
//!
//! A report window goes through three calls: create, poll until the report
//! is ready, download the gzip payload. Creation is not idempotent upstream,
//! so a "duplicate of" rejection is resolved by adopting the existing report.

use crate::decode::DecoderConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::partition::DateWindow;
use crate::state::compare_cursors;
use crate::streams::{ReportDefinition, StreamDefinition};
use crate::types::{value_to_id, ProfileId};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

static DUPLICATE_REPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)duplicate\s+of\s*:\s*([a-f0-9\-]{36})").expect("static regex is valid")
});

// ============================================================================
// Poll Settings
// ============================================================================

/// Report status polling schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay after the first pending status
    pub interval: Duration,
    /// Delay cap
    pub max_interval: Duration,
    /// Status checks before giving up
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(60),
            max_attempts: 200,
        }
    }
}

impl PollSettings {
    /// Delay after the given (0-based) pending status
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.interval.saturating_mul(factor).min(self.max_interval)
    }
}

// ============================================================================
// Report Runner
// ============================================================================

/// Runs report windows of one report stream for one profile
#[derive(Debug, Clone)]
pub struct ReportRunner {
    client: Arc<HttpClient>,
    stream: Arc<StreamDefinition>,
    report: ReportDefinition,
    profile_id: ProfileId,
    poll: PollSettings,
}

impl ReportRunner {
    /// Create a runner; fails for non-report streams
    pub fn new(
        client: Arc<HttpClient>,
        stream: Arc<StreamDefinition>,
        profile_id: ProfileId,
        poll: PollSettings,
    ) -> Result<Self> {
        let report = stream
            .report
            .clone()
            .ok_or_else(|| Error::config(format!("Stream '{}' is not a report", stream.name)))?;

        Ok(Self {
            client,
            stream,
            report,
            profile_id,
            poll,
        })
    }

    /// Create, await and download one window; records are schema-conformed
    pub async fn run_window(&self, window: &DateWindow) -> Result<Vec<Value>> {
        let report_id = self.create(window).await?;
        let url = self.wait(&report_id).await?;
        let records = self.download(&url).await?;
        info!(
            profile_id = %self.profile_id,
            stream = %self.stream.name,
            report_id = %report_id,
            start = %window.start_str(),
            end = %window.end_str(),
            records = records.len(),
            "Report window downloaded"
        );
        Ok(records)
    }

    /// Request a report for the window, returning its id
    pub async fn create(&self, window: &DateWindow) -> Result<String> {
        let name = format!(
            "{}_{}_{}_{}",
            self.stream.name,
            window.start_str(),
            window.end_str(),
            Uuid::new_v4()
        );
        let request = RequestConfig::new()
            .profile(&self.profile_id)
            .media_type(self.stream.media_type.as_str())
            .json(self.report.payload(&name, window));

        match self
            .client
            .request_json::<Value>(Method::POST, &self.stream.path, request)
            .await
        {
            Ok(body) => body
                .get("reportId")
                .and_then(value_to_id)
                .ok_or_else(|| Error::report("-", format!("creation response without reportId: {body}"))),
            Err(Error::HttpStatus { status, body }) if status == 409 || status == 425 => {
                match duplicate_report_id(&body) {
                    Some(report_id) => {
                        info!(
                            profile_id = %self.profile_id,
                            stream = %self.stream.name,
                            report_id = %report_id,
                            "Reusing existing report"
                        );
                        Ok(report_id)
                    }
                    None => Err(Error::http_status(status, body)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Poll the report until it completes, returning the download URL
    pub async fn wait(&self, report_id: &str) -> Result<String> {
        let path = format!("{}/{}", self.stream.path.trim_end_matches('/'), report_id);

        for attempt in 0..self.poll.max_attempts {
            let request = RequestConfig::new()
                .profile(&self.profile_id)
                .header("Accept", "*/*");
            let status: Value = self.client.request_json(Method::GET, &path, request).await?;

            match status.get("status").and_then(Value::as_str).unwrap_or_default() {
                "COMPLETED" => {
                    return status
                        .get("url")
                        .and_then(Value::as_str)
                        .map(ToString::to_string)
                        .ok_or_else(|| Error::report(report_id, "completed without a download url"));
                }
                state @ ("FAILURE" | "FAILED" | "CANCELLED") => {
                    let reason = status
                        .get("failureReason")
                        .and_then(Value::as_str)
                        .unwrap_or("no reason given");
                    return Err(Error::report(report_id, format!("{state}: {reason}")));
                }
                state => {
                    if attempt + 1 < self.poll.max_attempts {
                        let delay = self.poll.delay(attempt);
                        debug!(
                            profile_id = %self.profile_id,
                            report_id,
                            status = state,
                            attempt = attempt + 1,
                            "Report pending, checking again in {delay:?}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(profile_id = %self.profile_id, report_id, "Report polling exhausted");
        Err(Error::report(
            report_id,
            format!("not completed after {} status checks", self.poll.max_attempts),
        ))
    }

    /// Download and decode a completed report (the URL is pre-signed).
    /// Rows come back as delivered; conformance happens on emission.
    pub async fn download(&self, url: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .get_with_config(url, RequestConfig::new().unauthenticated())
            .await?;
        let bytes = response.bytes().await?;
        DecoderConfig::gzip_json().decoder().decode(&bytes)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Existing report id from a duplicate-request rejection body
pub fn duplicate_report_id(body: &str) -> Option<String> {
    DUPLICATE_REPORT
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Date range to request: from the bookmark (or `start_date`) but never
/// earlier than the lookback floor, through `today`. `None` when nothing
/// is left to request.
pub fn report_range(
    bookmark: Option<&str>,
    start_date: Option<DateTime<Utc>>,
    today: NaiveDate,
    lookback_days: u32,
) -> Option<(NaiveDate, NaiveDate)> {
    let floor = today - ChronoDuration::days(i64::from(lookback_days));
    let requested = bookmark
        .and_then(parse_report_date)
        .or_else(|| start_date.map(|d| d.date_naive()));

    let start = requested.map_or(floor, |d| d.max(floor));
    (start <= today).then_some((start, today))
}

/// Latest replication-key value among the records
pub fn max_cursor(records: &[Value], key: &str) -> Option<String> {
    records
        .iter()
        .filter_map(|r| r.get(key).and_then(Value::as_str))
        .max_by(|a, b| compare_cursors(a, b))
        .map(ToString::to_string)
}

fn parse_report_date(value: &str) -> Option<NaiveDate> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
}
