//! Child stream iterator
//!
//! A child collection is fetched in batches: the parent ids collected for a
//! profile are split into groups of at most `cap`, and each group becomes one
//! filtered fetch sequence. Batches run strictly in order and never overlap.

use super::fetcher::PaginatedFetcher;
use super::types::{ChildPage, Page, ParentFilter};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::partition::BatchRouter;
use crate::streams::{BatchStyle, ParentLink, StreamDefinition};
use crate::types::{value_to_id, ProfileId};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Iterates a child collection scoped to batches of parent ids
#[derive(Debug, Clone)]
pub struct ChildIterator {
    client: Arc<HttpClient>,
    stream: Arc<StreamDefinition>,
    link: ParentLink,
    profile_id: ProfileId,
    page_size: u32,
    cap: usize,
}

impl ChildIterator {
    /// Create an iterator; fails if the stream has no parent link
    pub fn new(
        client: Arc<HttpClient>,
        stream: Arc<StreamDefinition>,
        profile_id: ProfileId,
        page_size: u32,
        cap: usize,
    ) -> Result<Self> {
        let link = stream
            .parent
            .clone()
            .ok_or_else(|| Error::config(format!("Stream '{}' has no parent", stream.name)))?;

        Ok(Self {
            client,
            stream,
            link,
            profile_id,
            page_size,
            cap: cap.max(1),
        })
    }

    /// Split parent ids into request batches, preserving order
    pub fn batches(&self, parent_ids: Vec<String>) -> Vec<Vec<String>> {
        BatchRouter::new(parent_ids, self.cap).batches()
    }

    /// Child pages for all parent ids. No parents means no requests.
    pub fn pages(self, parent_ids: Vec<String>) -> BoxStream<'static, Result<ChildPage>> {
        let batches = self.batches(parent_ids);
        let total = batches.len();
        let this = Arc::new(self);

        stream::iter(batches.into_iter().enumerate())
            .map(move |(index, batch)| {
                debug!(
                    profile_id = %this.profile_id,
                    stream = %this.stream.name,
                    batch = index + 1,
                    batches = total,
                    parents = batch.len(),
                    "Fetching child batch"
                );
                let filter = ParentFilter {
                    field: this.link.filter_field.clone(),
                    value: this.link.filter_value(&batch),
                };
                let fetcher = PaginatedFetcher::new(
                    Arc::clone(&this.client),
                    Arc::clone(&this.stream),
                    this.profile_id.clone(),
                    this.page_size,
                )
                .with_filter(filter);

                let this = Arc::clone(&this);
                fetcher
                    .pages()
                    .map_ok(move |page| this.scope_page(index, &batch, page))
            })
            .flatten()
            .boxed()
    }

    /// Apply the referential check to one page of a batch
    fn scope_page(&self, index: usize, batch: &[String], page: Page) -> ChildPage {
        if self.link.batch_style == BatchStyle::IdList {
            self.log_rejected_ids(&page.raw);
        }

        let allowed: HashSet<&str> = batch.iter().map(String::as_str).collect();
        let total = page.records.len();
        let records: Vec<Value> = page
            .records
            .into_iter()
            .filter(|record| {
                record
                    .get(&self.link.parent_key)
                    .and_then(value_to_id)
                    .is_some_and(|id| allowed.contains(id.as_str()))
            })
            .collect();

        let dropped = (total - records.len()) as u64;
        if dropped > 0 {
            warn!(
                profile_id = %self.profile_id,
                stream = %self.stream.name,
                batch = index + 1,
                dropped,
                "Dropped records whose {} is outside the requested batch",
                self.link.parent_key
            );
        }

        ChildPage {
            batch: index,
            page: page.number,
            records,
            dropped,
        }
    }

    /// Id-list endpoints report per-id failures next to the successes
    fn log_rejected_ids(&self, raw: &Value) {
        let Some(errors) = raw.get("error").and_then(Value::as_array) else {
            return;
        };
        for entry in errors {
            warn!(
                profile_id = %self.profile_id,
                stream = %self.stream.name,
                "Upstream rejected id: {entry}"
            );
        }
    }
}
