//! HTTP client module
//!
//! Provides HTTP client with retry, rate limiting, and backoff strategies.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx and transport failures with backoff
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Token Refresh**: one forced refresh and retry after a 401
//! - **Profile Scoping**: `Amazon-Advertising-API-Scope` per request

mod client;
mod rate_limit;

pub use client::{
    HttpClient, HttpClientConfig, RequestConfig, CLIENT_ID_HEADER, SCOPE_HEADER,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
