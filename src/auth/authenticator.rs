//! Authenticator implementation
//!
//! Owns the shared token cache. Any number of workers may read the cached
//! token concurrently; a refresh happens under the write lock and the first
//! worker to take it performs the network call while the others re-check.

use super::types::{CachedToken, OAuthCredentials};
use crate::error::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Timeout for a single token request
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticator for the Login with Amazon refresh-token flow
pub struct Authenticator {
    /// Credentials used for every refresh
    credentials: OAuthCredentials,
    /// Current access token
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
    /// Number of token requests performed
    refreshes: AtomicU32,
}

impl Authenticator {
    /// Create a new authenticator
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self::with_client(credentials, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(credentials: OAuthCredentials, http_client: Client) -> Self {
        Self {
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
            refreshes: AtomicU32::new(0),
        }
    }

    /// Get a valid access token, refreshing if necessary
    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let new_token = self.fetch_new_token().await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    /// Replace a token the API rejected with 401.
    ///
    /// If the cache already holds a different token, another worker has
    /// refreshed since `stale` was handed out and that token is returned
    /// without a new token request.
    pub async fn refresh_rejected(&self, stale: &str) -> Result<String> {
        let mut cached = self.cached_token.write().await;

        if let Some(token) = cached.as_ref() {
            if token.token != stale && !token.is_expired() {
                debug!("Token already refreshed by another worker");
                return Ok(token.token.clone());
            }
        }

        *cached = None;
        let new_token = self.fetch_new_token().await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    /// Number of token requests performed so far
    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Clear the cached token
    pub async fn clear_cache(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }

    /// Get the credentials
    pub fn credentials(&self) -> &OAuthCredentials {
        &self.credentials
    }

    /// Exchange the refresh token for a new access token
    async fn fetch_new_token(&self) -> Result<CachedToken> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.credentials.token_url)
            .form(&form)
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, "OAuth token refresh rejected");
            return Err(Error::auth(format!(
                "Refresh token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Malformed token response: {e}")))?;

        if token_response.access_token.is_empty() {
            return Err(Error::auth("Token response carried an empty access_token"));
        }

        if token_response.expires_in.is_none() {
            info!("No expires_in in token response, token treated as non-expiring");
        } else {
            info!("OAuth authorization was successful");
        }

        Ok(token_response.into_cached_token())
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("credentials", &self.credentials)
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_cached_token(self) -> CachedToken {
        match self.expires_in {
            Some(secs) => CachedToken::expires_in(self.access_token, secs),
            None => CachedToken::new(self.access_token, None),
        }
    }
}
