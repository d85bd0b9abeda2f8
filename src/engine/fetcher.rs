//! Paginated fetcher
//!
//! Issues the requests of one collection fetch and follows the continuation
//! token until the endpoint reports no more pages. Retries, token refresh and
//! pacing live in the HTTP client; this layer only shapes requests and
//! decodes responses.

use super::types::{Page, ParentFilter};
use crate::decode::JsonDecoder;
use crate::error::Result;
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{PaginationConfig, PaginationState, Paginator};
use crate::streams::StreamDefinition;
use crate::types::{JsonObject, Method, ProfileId};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Fetches every page of one collection for one profile
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    client: Arc<HttpClient>,
    stream: Arc<StreamDefinition>,
    profile_id: ProfileId,
    page_size: u32,
    filter: Option<ParentFilter>,
}

impl PaginatedFetcher {
    /// Create a fetcher without a parent filter
    pub fn new(
        client: Arc<HttpClient>,
        stream: Arc<StreamDefinition>,
        profile_id: ProfileId,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            stream,
            profile_id,
            page_size,
            filter: None,
        }
    }

    /// Scope every request to a parent-id filter
    #[must_use]
    pub fn with_filter(mut self, filter: ParentFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Request body before the continuation token is applied
    pub fn request_body(&self) -> JsonObject {
        let mut body = self.stream.body.clone();
        if !matches!(self.stream.pagination, PaginationConfig::None) {
            body.insert("maxResults".to_string(), Value::from(self.page_size));
        }
        if let Some(filter) = &self.filter {
            body.insert(filter.field.clone(), filter.value.clone());
        }
        body
    }

    /// Lazy page sequence. Each poll issues at most one request; the sequence
    /// ends after the page that carried no continuation token.
    pub fn pages(self) -> BoxStream<'static, Result<Page>> {
        let paginator = self.stream.pagination.paginator();
        let decoder = JsonDecoder::with_path(self.stream.record_path.clone());
        let fetcher = Arc::new(self);

        stream::try_unfold(
            (fetcher, paginator, decoder, PaginationState::new()),
            |(fetcher, paginator, decoder, mut state)| async move {
                if state.done {
                    return Ok(None);
                }
                let page = fetcher
                    .fetch_page(paginator.as_ref(), &decoder, &mut state)
                    .await?;
                Ok(Some((page, (fetcher, paginator, decoder, state))))
            },
        )
        .boxed()
    }

    async fn fetch_page(
        &self,
        paginator: &dyn Paginator,
        decoder: &JsonDecoder,
        state: &mut PaginationState,
    ) -> Result<Page> {
        let mut body = self.request_body();
        paginator.apply(state, &mut body);

        let mut request = RequestConfig::new()
            .profile(&self.profile_id)
            .media_type(self.stream.media_type.as_str());
        if self.stream.method == Method::POST {
            request = request.json(Value::Object(body));
        }

        let raw: Value = self
            .client
            .request_json(self.stream.method.into(), &self.stream.path, request)
            .await?;
        let records = decoder.extract_records(&raw)?;

        let number = state.page + 1;
        let next = paginator.process_response(&raw, records.len(), state);
        debug!(
            profile_id = %self.profile_id,
            stream = %self.stream.name,
            page = number,
            records = records.len(),
            last = next.is_done(),
            "Fetched page"
        );

        Ok(Page {
            number,
            records,
            raw,
        })
    }
}
