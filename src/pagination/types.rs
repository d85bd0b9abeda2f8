//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::types::JsonObject;
use serde_json::Value;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available, continue with this token
    Continue {
        /// Continuation token from the last response
        token: String,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with a token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::Continue {
            token: token.into(),
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Configuration for pagination behavior
#[derive(Debug, Clone, Default)]
pub enum PaginationConfig {
    /// Single response
    #[default]
    None,

    /// Continuation-token pagination, token carried in the JSON body
    NextToken {
        /// Request field carrying the token
        token_param: String,
        /// Path of the token in the response
        token_path: String,
    },
}

impl PaginationConfig {
    /// Amazon Ads v3 list endpoints: `nextToken` in and out of the JSON body
    pub fn next_token() -> Self {
        Self::NextToken {
            token_param: "nextToken".to_string(),
            token_path: "$.nextToken".to_string(),
        }
    }

    /// Build the paginator described by this config
    pub fn paginator(&self) -> Box<dyn Paginator> {
        match self {
            Self::None => Box::new(super::NoPaginator),
            Self::NextToken {
                token_param,
                token_path,
            } => Box::new(super::NextTokenPaginator::new(token_param, token_path)),
        }
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages fetched so far
    pub page: u32,
    /// Current continuation token
    pub cursor: Option<String>,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete and drop the token
    pub fn mark_done(&mut self) {
        self.done = true;
        self.cursor = None;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }

    /// Record a fetched page
    pub fn add_page(&mut self, records: u64) {
        self.page += 1;
        self.total_fetched += records;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Add the continuation token (if any) to the next request body
    fn apply(&self, state: &PaginationState, body: &mut JsonObject);

    /// Process a response and determine if there's a next page
    fn process_response(
        &self,
        body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage;
}
