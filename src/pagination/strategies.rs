//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{NextPage, PaginationState, Paginator};
use crate::decode::value_at;
use crate::types::JsonObject;
use serde_json::Value;

// ============================================================================
// Next Token Pagination
// ============================================================================

/// Continuation-token pagination
///
/// The response carries an opaque token (`nextToken`) that is echoed back on
/// the following request. A missing, null or empty token ends the sequence,
/// and so does an empty page whatever token it carries.
#[derive(Debug, Clone)]
pub struct NextTokenPaginator {
    /// Request field carrying the token
    pub token_param: String,
    /// Path of the token in the response
    pub token_path: String,
}

impl NextTokenPaginator {
    /// Create a new token paginator (token in the JSON body)
    pub fn new(token_param: impl Into<String>, token_path: impl Into<String>) -> Self {
        Self {
            token_param: token_param.into(),
            token_path: token_path.into(),
        }
    }
}

impl Paginator for NextTokenPaginator {
    fn apply(&self, state: &PaginationState, body: &mut JsonObject) {
        if let Some(token) = &state.cursor {
            body.insert(self.token_param.clone(), Value::String(token.clone()));
        }
    }

    fn process_response(
        &self,
        body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.add_page(records_count as u64);

        if records_count == 0 {
            state.mark_done();
            return NextPage::Done;
        }

        match value_at(body, &self.token_path).and_then(Value::as_str) {
            Some(token) if !token.is_empty() => {
                state.set_cursor(token.to_string());
                NextPage::with_token(token)
            }
            _ => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// Single-response endpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn apply(&self, _state: &PaginationState, _body: &mut JsonObject) {}

    fn process_response(
        &self,
        _body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.add_page(records_count as u64);
        state.mark_done();
        NextPage::Done
    }
}
