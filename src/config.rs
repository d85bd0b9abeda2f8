//! Tap configuration
//!
//! The configuration is a flat JSON (or YAML) object. Credentials and the
//! profile list are required; everything else has a default. Required fields
//! are checked on the raw document before deserialization so a missing key
//! is reported by name, before any network call is made.

use crate::auth::OAuthCredentials;
use crate::error::{Error, Result};
use crate::engine::PollSettings;
use crate::http::{HttpClientConfig, RateLimiterConfig, CLIENT_ID_HEADER};
use crate::types::{JsonValue, OptionStringExt, ProfileId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default Amazon Ads API root (North America)
pub const DEFAULT_API_URL: &str = "https://advertising-api.amazon.com";

/// Default Login with Amazon token endpoint
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://api.amazon.com/auth/o2/token";

/// Default OAuth scope
pub const DEFAULT_PERMISSION_SCOPE: &str = "advertising::campaign_management";

/// Fields that must be present and non-empty
const REQUIRED_FIELDS: [&str; 4] = ["client_id", "client_secret", "refresh_token", "profile_ids"];

/// Upper bound accepted by the v3 list endpoints for `maxResults`
const MAX_PAGE_SIZE: u32 = 5000;

/// Reporting API rejects date ranges longer than this
const MAX_REPORT_WINDOW_DAYS: u32 = 31;

// ============================================================================
// Tap Config
// ============================================================================

/// Complete tap configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Login with Amazon client id
    pub client_id: String,

    /// Login with Amazon client secret
    pub client_secret: String,

    /// Long-lived OAuth2 refresh token
    pub refresh_token: String,

    /// Advertiser profiles to extract
    pub profile_ids: Vec<ProfileId>,

    /// API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// OAuth2 token endpoint
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    /// OAuth2 permission scope
    #[serde(default = "default_permission_scope")]
    pub permission_scope: String,

    /// Earliest date for incremental report streams
    #[serde(default, deserialize_with = "deserialize_start_date")]
    pub start_date: Option<DateTime<Utc>>,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// `maxResults` per list request
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum parent ids per scoped child request
    #[serde(default = "default_batch_size")]
    pub parent_filter_batch_size: usize,

    /// Retry ceiling for 429/5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Shared request quota
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Number of profiles extracted concurrently
    #[serde(default = "default_max_concurrent_profiles")]
    pub max_concurrent_profiles: usize,

    /// How far back report streams reach
    #[serde(default = "default_report_lookback_days")]
    pub report_lookback_days: u32,

    /// Maximum days covered by one report request
    #[serde(default = "default_report_window_days")]
    pub report_window_days: u32,

    /// First report status poll delay in seconds
    #[serde(default = "default_report_poll_interval_secs")]
    pub report_poll_interval_secs: u64,

    /// Report status poll delay cap in seconds
    #[serde(default = "default_report_poll_max_interval_secs")]
    pub report_poll_max_interval_secs: u64,

    /// Number of status polls before a report is abandoned
    #[serde(default = "default_report_poll_max_attempts")]
    pub report_poll_max_attempts: u32,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_auth_endpoint() -> String {
    DEFAULT_AUTH_ENDPOINT.to_string()
}

fn default_permission_scope() -> String {
    DEFAULT_PERMISSION_SCOPE.to_string()
}

fn default_user_agent() -> String {
    format!("tap-amazon-ads/{}", env!("CARGO_PKG_VERSION"))
}

fn default_page_size() -> u32 {
    100
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_max_concurrent_profiles() -> usize {
    1
}

fn default_report_lookback_days() -> u32 {
    30
}

fn default_report_window_days() -> u32 {
    MAX_REPORT_WINDOW_DAYS
}

fn default_report_poll_interval_secs() -> u64 {
    5
}

fn default_report_poll_max_interval_secs() -> u64 {
    60
}

fn default_report_poll_max_attempts() -> u32 {
    200
}

/// Accepts `YYYY-MM-DD` or RFC 3339; empty strings mean "unset"
fn deserialize_start_date<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.none_if_empty();
    raw.map(|s| parse_start_date(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Parse a start date in either date or datetime form
pub fn parse_start_date(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| Error::invalid_value("start_date", format!("unrecognised date '{value}'")))
}

impl TapConfig {
    /// Build a config from a parsed JSON document
    pub fn from_value(value: JsonValue) -> Result<Self> {
        check_required(&value)?;
        let config: TapConfig =
            serde_json::from_value(value).map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from JSON or YAML text
    pub fn from_str(text: &str) -> Result<Self> {
        let value: JsonValue = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => serde_yaml::from_str(text)?,
        };
        Self::from_value(value)
    }

    /// Load a config file (`.json`, `.yaml` or `.yml`)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file {}: {e}", path.display())))?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            let value: JsonValue = serde_yaml::from_str(&text)?;
            Self::from_value(value)
        } else {
            Self::from_str(&text)
        }
    }

    /// Check value ranges and URL syntax
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url)
            .map_err(|e| Error::invalid_value("api_url", e.to_string()))?;
        url::Url::parse(&self.auth_endpoint)
            .map_err(|e| Error::invalid_value("auth_endpoint", e.to_string()))?;

        if self.profile_ids.iter().any(|p| p.as_str().is_empty()) {
            return Err(Error::invalid_value("profile_ids", "profile ids must not be empty"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_value(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if self.parent_filter_batch_size == 0 {
            return Err(Error::invalid_value("parent_filter_batch_size", "must be at least 1"));
        }
        if self.max_concurrent_profiles == 0 {
            return Err(Error::invalid_value("max_concurrent_profiles", "must be at least 1"));
        }
        if self.requests_per_second == 0 {
            return Err(Error::invalid_value("requests_per_second", "must be at least 1"));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::invalid_value(
                "initial_backoff_ms",
                "must not exceed max_backoff_ms",
            ));
        }
        if self.report_lookback_days == 0 {
            return Err(Error::invalid_value("report_lookback_days", "must be at least 1"));
        }
        if self.report_window_days == 0 || self.report_window_days > MAX_REPORT_WINDOW_DAYS {
            return Err(Error::invalid_value(
                "report_window_days",
                format!("must be between 1 and {MAX_REPORT_WINDOW_DAYS}"),
            ));
        }
        if self.report_poll_max_attempts == 0 {
            return Err(Error::invalid_value("report_poll_max_attempts", "must be at least 1"));
        }
        Ok(())
    }

    /// OAuth credentials for the token provider
    pub fn credentials(&self) -> OAuthCredentials {
        OAuthCredentials {
            token_url: self.auth_endpoint.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
            scope: self.permission_scope.clone(),
        }
    }

    /// HTTP client settings derived from the tuning keys
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig::builder()
            .base_url(&self.api_url)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .max_retries(self.max_retries)
            .backoff(
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
            )
            .rate_limit(RateLimiterConfig::per_second(self.requests_per_second))
            .header(CLIENT_ID_HEADER, &self.client_id)
            .user_agent(&self.user_agent)
            .build()
    }

    /// Report status polling schedule
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.report_poll_interval_secs.max(1)),
            max_interval: Duration::from_secs(self.report_poll_max_interval_secs),
            max_attempts: self.report_poll_max_attempts,
        }
    }
}

/// Reject documents that lack any required field
fn check_required(value: &JsonValue) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::config("Config must be a JSON object"))?;

    for field in REQUIRED_FIELDS {
        let present = match obj.get(field) {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::String(s)) => !s.trim().is_empty(),
            Some(JsonValue::Array(items)) => !items.is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(Error::missing_field(field));
        }
    }
    Ok(())
}

impl fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &"***")
            .field("profile_ids", &self.profile_ids)
            .field("api_url", &self.api_url)
            .field("auth_endpoint", &self.auth_endpoint)
            .field("start_date", &self.start_date)
            .field("page_size", &self.page_size)
            .field("parent_filter_batch_size", &self.parent_filter_batch_size)
            .field("max_concurrent_profiles", &self.max_concurrent_profiles)
            .finish_non_exhaustive()
    }
}
