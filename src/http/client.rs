//! HTTP client with retry and rate limiting
//!
//! Provides the HTTP client every Amazon Ads call goes through. It handles:
//! - bearer token injection and the one-shot refresh after a 401
//! - profile scoping via `Amazon-Advertising-API-Scope`
//! - retries with exponential backoff for 429, any 5xx and transport failures
//! - translation of failures into the crate error taxonomy

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::types::ProfileId;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the advertiser profile
pub const SCOPE_HEADER: &str = "Amazon-Advertising-API-Scope";

/// Header carrying the LWA client id
pub const CLIENT_ID_HEADER: &str = "Amazon-Advertising-API-ClientId";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(60),
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("tap-amazon-ads/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the first retry delay and the delay cap
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Profile the request is scoped to
    pub profile_id: Option<ProfileId>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<Value>,
    /// Content type for the JSON body
    pub content_type: Option<String>,
    /// Whether to send the bearer token
    pub authenticated: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            profile_id: None,
            headers: HashMap::new(),
            body: None,
            content_type: None,
            authenticated: true,
        }
    }
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the request to a profile
    #[must_use]
    pub fn profile(mut self, profile_id: &ProfileId) -> Self {
        self.profile_id = Some(profile_id.clone());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set `Accept` and the JSON body content type to a vendor media type
    #[must_use]
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        let media_type = media_type.into();
        self.headers.insert("Accept".to_string(), media_type.clone());
        self.content_type = Some(media_type);
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send without credentials (pre-signed download URLs)
    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Arc<Authenticator>>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator: None,
            rate_limiter,
        })
    }

    /// Create a client that authenticates with a shared authenticator
    pub fn with_auth(config: HttpClientConfig, authenticator: Arc<Authenticator>) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.authenticator = Some(authenticator);
        Ok(client)
    }

    /// Get the shared authenticator
    pub fn authenticator(&self) -> Option<&Arc<Authenticator>> {
        self.authenticator.as_ref()
    }

    /// Make a GET request with config
    pub async fn get_with_config(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.request(Method::GET, url, config).await
    }

    /// Make a request, retrying transient failures.
    ///
    /// 401 triggers one token refresh and one extra attempt that does not
    /// count against the retry budget. 403 and other 4xx fail immediately.
    #[allow(clippy::too_many_lines)]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<Response> {
        let full_url = self.build_url(url);
        let max_retries = self.config.max_retries;
        let profile = config
            .profile_id
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);

        let auth = if config.authenticated {
            self.authenticator.as_ref()
        } else {
            None
        };

        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.request(method.clone(), &full_url);

            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if let Some(ref profile_id) = config.profile_id {
                req = req.header(SCOPE_HEADER, profile_id.as_str());
            }
            for (key, value) in &config.headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if let Some(ref body) = config.body {
                req = req.json(body);
                if let Some(ref content_type) = config.content_type {
                    req = req.header(reqwest::header::CONTENT_TYPE, content_type.as_str());
                }
            }

            let token = match auth {
                Some(auth) => {
                    let token = auth.access_token().await?;
                    req = req.bearer_auth(&token);
                    Some(token)
                }
                None => None,
            };

            let outcome = req.send().await;

            let response = match outcome {
                Ok(response) => response,
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect() || e.is_request();
                    if transient && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            profile_id = %profile,
                            attempt = attempt + 1,
                            "Transport error on {method} {full_url}: {e}, retrying in {delay:?}"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    if e.is_timeout() {
                        return Err(Error::Timeout {
                            timeout_ms: self.config.timeout.as_millis() as u64,
                        });
                    }
                    return Err(Error::Http(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                debug!(profile_id = %profile, "Request succeeded: {method} {full_url}");
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED {
                match (auth, token) {
                    (Some(auth), Some(stale)) if !refreshed => {
                        warn!(profile_id = %profile, "Access token rejected (401), refreshing");
                        auth.refresh_rejected(&stale).await?;
                        refreshed = true;
                        continue;
                    }
                    _ => {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::auth(format!(
                            "Request to {full_url} unauthorized after token refresh: {body}"
                        )));
                    }
                }
            }

            if status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::access_denied(profile, body));
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < max_retries {
                    let delay = self.retry_after(response.headers(), attempt);
                    warn!(
                        profile_id = %profile,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        "Rate limited (429), waiting {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(Error::RateLimitExceeded {
                    attempts: attempt + 1,
                });
            }

            if status.is_server_error() {
                if attempt < max_retries {
                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        profile_id = %profile,
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        "Upstream error, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(Error::UpstreamServer {
                    status: status.as_u16(),
                    attempts: attempt + 1,
                });
            }

            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }
    }

    /// Make a request and parse JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<T> {
        let response = self.request(method, url, config).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::decode(format!("Invalid JSON from {url}: {e}")))
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Delay before retrying a 429: `Retry-After` seconds when present, capped
    fn retry_after(&self, headers: &HeaderMap, attempt: u32) -> Duration {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map_or_else(
                || self.calculate_backoff(attempt),
                |secs| std::cmp::min(Duration::from_secs(secs), self.config.max_backoff),
            )
    }

    /// Exponential backoff delay for a given attempt, capped
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .config
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
