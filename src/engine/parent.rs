//! Parent stream iterator

use super::fetcher::PaginatedFetcher;
use super::types::ParentRecord;
use crate::error::Result;
use crate::http::HttpClient;
use crate::streams::StreamDefinition;
use crate::types::ProfileId;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Iterates a top-level collection, pairing each record with its child link
#[derive(Debug, Clone)]
pub struct ParentIterator {
    fetcher: PaginatedFetcher,
    id_field: Option<String>,
}

impl ParentIterator {
    /// Create an iterator over one parent stream for one profile
    pub fn new(
        client: Arc<HttpClient>,
        stream: Arc<StreamDefinition>,
        profile_id: ProfileId,
        page_size: u32,
    ) -> Self {
        let id_field = stream.id_field.clone();
        Self {
            fetcher: PaginatedFetcher::new(client, stream, profile_id, page_size),
            id_field,
        }
    }

    /// Parent records, page by page
    pub fn pages(self) -> BoxStream<'static, Result<Vec<ParentRecord>>> {
        let id_field = self.id_field;
        self.fetcher
            .pages()
            .map_ok(move |page| {
                page.records
                    .into_iter()
                    .map(|record| ParentRecord::new(record, id_field.as_deref()))
                    .collect()
            })
            .boxed()
    }

    /// Parent records, one at a time
    pub fn records(self) -> BoxStream<'static, Result<ParentRecord>> {
        self.pages()
            .map_ok(|records| stream::iter(records.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}
