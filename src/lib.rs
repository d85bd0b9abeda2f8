// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # tap-amazon-ads
//!
//! Extracts Amazon Ads Sponsored Products entities and reports for one or
//! more advertiser profiles and writes them as JSON-lines records.
//!
//! ## Features
//!
//! - **Login with Amazon**: refresh-token flow with a shared token cache
//! - **Resilient HTTP**: retry with backoff, `Retry-After`, shared rate limit
//! - **Parent/child streams**: child collections fetched in batches of parent ids
//! - **Async reports**: create, poll and download gzip report windows
//! - **Incremental state**: per-profile bookmarks, checkpointed atomically
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tap_amazon_ads::{AmazonAdsConnector, Connector, TapConfig, Result};
//! use tap_amazon_ads::output::StdoutSink;
//! use tap_amazon_ads::state::StateManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = TapConfig::from_path("config.json")?;
//!     let connector = AmazonAdsConnector::new();
//!
//!     let status = connector.check(&config).await?;
//!     let report = connector
//!         .read(
//!             &config,
//!             &["keywords".to_string()],
//!             StateManager::from_file("state.json")?,
//!             std::sync::Arc::new(StdoutSink::new()),
//!             Default::default(),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Connector Interface                         │
//! │  spec()   check() → profiles visible   discover() → catalog     │
//! │  read(streams, state) → RECORD / STATE lines                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │   Paginate    │ Partition │   Engine    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ LWA      │ POST/GET  │ nextToken     │ Id batch  │ Parent      │
//! │ refresh  │ Retry     │ Single page   │ Date      │ Child       │
//! │ token    │ Rate Limit│               │ windows   │ Report      │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration
pub mod config;

/// Login with Amazon authentication
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Parent-id batches and report date windows
pub mod partition;

/// Response decoders (JSON, gzip JSON)
pub mod decode;

/// Declared record schemas and conformance
pub mod schema;

/// Bookmarks and checkpointing
pub mod state;

/// Stream catalog
pub mod streams;

/// Main execution engine
pub mod engine;

/// JSON-lines protocol output
pub mod output;

/// Connector trait and implementation
pub mod connector;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::TapConfig;
pub use connector::{AmazonAdsConnector, CheckResult, Connector, ConnectorSpec};
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
