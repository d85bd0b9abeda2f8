//! Connector trait and the Amazon Ads connector
//!
//! The four protocol operations: `spec` describes the configuration,
//! `check` validates credentials and profile access, `discover` lists the
//! stream catalog and `read` runs a sync.

use crate::auth::Authenticator;
use crate::config::TapConfig;
use crate::engine::{SyncEngine, SyncReport};
use crate::error::{Result, ResultExt};
use crate::http::{HttpClient, RequestConfig};
use crate::output::MessageSink;
use crate::schema::{JsonSchema, SchemaProperty};
use crate::state::StateManager;
use crate::streams::Catalog;
use crate::types::{value_to_id, ProfileId};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Profile listing used by the connection check
const PROFILES_PATH: &str = "/v2/profiles";

// ============================================================================
// Connector Spec
// ============================================================================

/// Connector specification returned by spec()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSpec {
    /// Connector name
    pub name: String,

    /// Human-readable title
    pub title: String,

    /// Description
    pub description: Option<String>,

    /// JSON schema of the configuration document
    pub connection_specification: Value,
}

// ============================================================================
// Check Result
// ============================================================================

/// Result of a connection check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check succeeded
    pub success: bool,

    /// Error message if failed
    pub message: Option<String>,
}

impl CheckResult {
    /// Create a successful check result
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Create a failed check result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

// ============================================================================
// Connector Trait
// ============================================================================

/// Core trait that connectors implement
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector specification
    fn spec(&self) -> ConnectorSpec;

    /// Tests if credentials and configuration are valid
    async fn check(&self, config: &TapConfig) -> Result<CheckResult>;

    /// Lists available streams
    async fn discover(&self, config: &TapConfig) -> Result<Value>;

    /// Reads the selected streams (all when empty), writing protocol
    /// messages to `sink` and bookmarks to `state`
    async fn read(
        &self,
        config: &TapConfig,
        streams: &[String],
        state: StateManager,
        sink: Arc<dyn MessageSink>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<SyncReport>;
}

// ============================================================================
// Amazon Ads Connector
// ============================================================================

/// Sponsored Products / Display connector
#[derive(Debug, Clone, Default)]
pub struct AmazonAdsConnector {
    catalog: Catalog,
}

impl AmazonAdsConnector {
    /// Create a connector over the full stream catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector over a custom catalog
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Get the catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// HTTP client with the shared token cache and rate limiter
    pub fn client(config: &TapConfig) -> Result<Arc<HttpClient>> {
        let authenticator = Arc::new(Authenticator::new(config.credentials()));
        let client = HttpClient::with_auth(config.http_client_config(), authenticator)
            .context("Failed to build HTTP client")?;
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl Connector for AmazonAdsConnector {
    fn spec(&self) -> ConnectorSpec {
        ConnectorSpec {
            name: crate::NAME.to_string(),
            title: "Amazon Ads".to_string(),
            description: Some(
                "Sponsored Products entities and Sponsored Products / Display reports".to_string(),
            ),
            connection_specification: config_schema().to_json(),
        }
    }

    async fn check(&self, config: &TapConfig) -> Result<CheckResult> {
        let client = Self::client(config)?;

        if let Some(auth) = client.authenticator() {
            if let Err(e) = auth.access_token().await {
                return Ok(CheckResult::failure(e.to_string()));
            }
        }

        let profiles: Value = match client
            .request_json(Method::GET, PROFILES_PATH, RequestConfig::new())
            .await
        {
            Ok(profiles) => profiles,
            Err(e) => return Ok(CheckResult::failure(e.to_string())),
        };

        let visible = visible_profiles(&profiles);
        let missing: Vec<&str> = config
            .profile_ids
            .iter()
            .map(ProfileId::as_str)
            .filter(|id| !visible.contains(*id))
            .collect();

        if missing.is_empty() {
            info!(profiles = config.profile_ids.len(), "Connection check passed");
            Ok(CheckResult::success())
        } else {
            warn!(missing = ?missing, "Configured profiles not visible to these credentials");
            Ok(CheckResult::failure(format!(
                "Profiles not accessible: {}",
                missing.join(", ")
            )))
        }
    }

    async fn discover(&self, _config: &TapConfig) -> Result<Value> {
        Ok(self.catalog.to_json())
    }

    async fn read(
        &self,
        config: &TapConfig,
        streams: &[String],
        state: StateManager,
        sink: Arc<dyn MessageSink>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<SyncReport> {
        let client = Self::client(config)?;
        SyncEngine::new(config, client, state, sink)
            .with_catalog(self.catalog.clone())
            .with_cancellation(cancelled)
            .run(streams)
            .await
    }
}

/// Profile ids listed by `/v2/profiles`
fn visible_profiles(profiles: &Value) -> BTreeSet<String> {
    profiles
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p.get("profileId").and_then(value_to_id))
                .collect()
        })
        .unwrap_or_default()
}

/// JSON schema of the configuration document
fn config_schema() -> JsonSchema {
    JsonSchema::from_properties([
        ("client_id", SchemaProperty::string().with_description("Login with Amazon client id")),
        ("client_secret", SchemaProperty::string().with_description("Login with Amazon client secret")),
        ("refresh_token", SchemaProperty::string().with_description("OAuth2 refresh token")),
        (
            "profile_ids",
            SchemaProperty::array(SchemaProperty::string())
                .with_description("Advertiser profiles to extract"),
        ),
        ("api_url", SchemaProperty::string().with_format("uri")),
        ("auth_endpoint", SchemaProperty::string().with_format("uri")),
        ("permission_scope", SchemaProperty::string()),
        (
            "start_date",
            SchemaProperty::date_time().with_description("Earliest date for report streams"),
        ),
        ("user_agent", SchemaProperty::string()),
        ("page_size", SchemaProperty::integer()),
        ("parent_filter_batch_size", SchemaProperty::integer()),
        ("max_retries", SchemaProperty::integer()),
        ("initial_backoff_ms", SchemaProperty::integer()),
        ("max_backoff_ms", SchemaProperty::integer()),
        ("request_timeout_secs", SchemaProperty::integer()),
        ("requests_per_second", SchemaProperty::integer()),
        ("max_concurrent_profiles", SchemaProperty::integer()),
        ("report_lookback_days", SchemaProperty::integer()),
        ("report_window_days", SchemaProperty::integer()),
        ("report_poll_interval_secs", SchemaProperty::integer()),
        ("report_poll_max_interval_secs", SchemaProperty::integer()),
        ("report_poll_max_attempts", SchemaProperty::integer()),
    ])
    .with_required(&["client_id", "client_secret", "refresh_token", "profile_ids"])
}
