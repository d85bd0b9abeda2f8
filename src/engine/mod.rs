//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `PaginatedFetcher` - one collection fetch, page by page
//! - `ParentIterator` / `ChildIterator` - parent records and batched,
//!   parent-scoped child fetches
//! - `ReportRunner` - create, poll and download asynchronous reports
//! - `SyncEngine` - runs the selected streams for every profile
//!
//! Profiles are independent: a stream failure is recorded and the next
//! stream (or profile) continues. Only run-fatal errors abort everything.

mod child;
mod fetcher;
mod parent;
mod report;
mod types;

pub use child::ChildIterator;
pub use fetcher::PaginatedFetcher;
pub use parent::ParentIterator;
pub use report::{duplicate_report_id, max_cursor, report_range, PollSettings, ReportRunner};
pub use types::{
    ChildPage, Page, ParentFilter, ParentRecord, StreamFailure, SyncOptions, SyncReport,
    SyncStats,
};

use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::{Message, MessageSink};
use crate::partition::DateWindowRouter;
use crate::schema::conform;
use crate::state::StateManager;
use crate::streams::{Catalog, Selection, StreamDefinition};
use crate::types::ProfileId;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// HTTP client shared by every worker
    client: Arc<HttpClient>,
    /// Stream definitions
    catalog: Catalog,
    /// Bookmark store
    state: StateManager,
    /// Protocol output
    sink: Arc<dyn MessageSink>,
    /// Profiles to extract
    profiles: Vec<ProfileId>,
    /// Tuning
    options: SyncOptions,
    /// Set by the shutdown signal handler
    cancelled: Arc<AtomicBool>,
    /// Set when a worker hits a run-fatal error
    aborted: AtomicBool,
}

/// What one profile worker produced
#[derive(Default)]
struct ProfileOutcome {
    stats: SyncStats,
    failures: Vec<StreamFailure>,
    fatal: Option<Error>,
}

impl SyncEngine {
    /// Create an engine for the configured profiles
    pub fn new(
        config: &TapConfig,
        client: Arc<HttpClient>,
        state: StateManager,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            client,
            catalog: Catalog::amazon_ads(),
            state,
            sink,
            profiles: config.profile_ids.clone(),
            options: SyncOptions::from_config(config),
            cancelled: Arc::new(AtomicBool::new(false)),
            aborted: AtomicBool::new(false),
        }
    }

    /// Use a different catalog
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Override tuning
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an externally owned cancellation flag
    #[must_use]
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Flag that stops the run between requests when set
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run the selected streams (all when empty) for every profile.
    ///
    /// Returns `Err` only for run-fatal errors; stream-scoped failures are
    /// listed in the report. State is checkpointed in both cases.
    pub async fn run(&self, streams: &[String]) -> Result<SyncReport> {
        let started = Instant::now();
        let selection = self.catalog.select(streams)?;

        for stream in &selection.run {
            if selection.should_emit(&stream.name) {
                self.sink.write(&Message::schema(
                    stream.name.clone(),
                    &stream.schema,
                    stream.key_properties.clone(),
                    stream.replication_key.as_deref(),
                ))?;
            }
        }

        info!(
            profiles = self.profiles.len(),
            streams = selection.run.len(),
            concurrency = self.options.max_concurrent_profiles.max(1),
            "Starting sync"
        );

        let outcomes: Vec<ProfileOutcome> = stream::iter(self.profiles.iter().cloned())
            .map(|profile_id| self.sync_profile(profile_id, &selection))
            .buffer_unordered(self.options.max_concurrent_profiles.max(1))
            .collect()
            .await;

        let mut report = SyncReport::default();
        let mut fatal = None;
        for outcome in outcomes {
            report.stats.merge(&outcome.stats);
            report.failures.extend(outcome.failures);
            if fatal.is_none() {
                fatal = outcome.fatal;
            }
        }
        report.cancelled = self.cancelled.load(Ordering::SeqCst);
        report.stats.duration_ms = started.elapsed().as_millis() as u64;

        self.state.checkpoint().await?;
        self.emit_state().await?;
        self.sink.flush()?;

        if let Some(err) = fatal {
            error!(error = %err, "Sync aborted");
            return Err(err);
        }

        info!(
            records = report.stats.records_emitted,
            pages = report.stats.pages_fetched,
            dropped = report.stats.records_dropped,
            failed = report.failures.len(),
            cancelled = report.cancelled,
            duration_ms = report.stats.duration_ms,
            "Sync finished"
        );
        Ok(report)
    }

    // ========================================================================
    // Per-profile loop
    // ========================================================================

    async fn sync_profile(&self, profile_id: ProfileId, selection: &Selection) -> ProfileOutcome {
        let mut outcome = ProfileOutcome::default();
        let mut parent_ids: HashMap<String, Vec<String>> = HashMap::new();
        let mut failed: HashSet<String> = HashSet::new();

        info!(profile_id = %profile_id, "Starting profile");

        for definition in &selection.run {
            if self.should_stop() {
                break;
            }
            let stream = Arc::new(definition.clone());

            let result = if stream.is_report() {
                self.sync_report(&profile_id, &stream, selection, &mut outcome.stats)
                    .await
            } else if let Some(link) = &stream.parent {
                if failed.contains(&link.parent) {
                    Err(Error::Other(format!(
                        "parent stream '{}' did not complete",
                        link.parent
                    )))
                } else {
                    let ids = parent_ids.get(&link.parent).cloned().unwrap_or_default();
                    self.sync_child(&profile_id, &stream, ids, selection, &mut outcome.stats)
                        .await
                }
            } else {
                self.sync_parent(&profile_id, &stream, selection, &mut outcome.stats)
                    .await
                    .map(|ids| {
                        if selection.has_children(&stream.name) {
                            parent_ids.insert(stream.name.clone(), ids);
                        }
                    })
            };

            match result {
                Ok(()) => outcome.stats.streams_completed += 1,
                Err(Error::Cancelled) => break,
                Err(err) if err.is_fatal() => {
                    error!(profile_id = %profile_id, stream = %stream.name, error = %err, "Fatal error");
                    self.aborted.store(true, Ordering::SeqCst);
                    outcome.fatal = Some(err);
                    break;
                }
                Err(err) => {
                    error!(profile_id = %profile_id, stream = %stream.name, error = %err, "Stream failed");
                    outcome.stats.streams_failed += 1;
                    failed.insert(stream.name.clone());
                    outcome.failures.push(StreamFailure {
                        profile_id: profile_id.clone(),
                        stream: stream.name.clone(),
                        error: err,
                    });
                }
            }

            if let Err(err) = self.state.checkpoint().await {
                warn!(profile_id = %profile_id, error = %err, "State checkpoint failed");
            }
        }

        info!(
            profile_id = %profile_id,
            records = outcome.stats.records_emitted,
            failed = outcome.failures.len(),
            "Profile finished"
        );
        outcome
    }

    // ========================================================================
    // Stream runners
    // ========================================================================

    /// Top-level stream; returns the child links it saw
    async fn sync_parent(
        &self,
        profile_id: &ProfileId,
        stream: &Arc<StreamDefinition>,
        selection: &Selection,
        stats: &mut SyncStats,
    ) -> Result<Vec<String>> {
        let emit = selection.should_emit(&stream.name);
        let collect = selection.has_children(&stream.name);
        let mut ids = Vec::new();
        let mut emitted = 0u64;

        let mut pages = ParentIterator::new(
            Arc::clone(&self.client),
            Arc::clone(stream),
            profile_id.clone(),
            self.options.page_size,
        )
        .pages();

        while let Some(page) = pages.try_next().await? {
            stats.pages_fetched += 1;
            let extracted_at = Utc::now();
            for parent in page {
                if collect {
                    if let Some(link) = parent.link {
                        ids.push(link);
                    }
                }
                if emit {
                    self.emit_record(stream, &parent.record, extracted_at)?;
                    emitted += 1;
                }
            }
            if emit {
                self.emit_state().await?;
            }
            self.check_running()?;
        }

        stats.records_emitted += emitted;
        self.finish_full_table(profile_id, stream, emit, emitted).await?;
        Ok(ids)
    }

    /// Child stream scoped to the parent ids collected earlier for this profile
    async fn sync_child(
        &self,
        profile_id: &ProfileId,
        stream: &Arc<StreamDefinition>,
        parent_ids: Vec<String>,
        selection: &Selection,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let emit = selection.should_emit(&stream.name);
        let iterator = ChildIterator::new(
            Arc::clone(&self.client),
            Arc::clone(stream),
            profile_id.clone(),
            self.options.page_size,
            self.options.parent_filter_batch_size,
        )?;

        let parents = parent_ids.len();
        let batches = parents.div_ceil(self.options.parent_filter_batch_size.max(1));
        info!(profile_id = %profile_id, stream = %stream.name, parents, batches, "Starting child stream");
        stats.child_batches += batches as u64;

        let mut emitted = 0u64;
        let mut pages = iterator.pages(parent_ids);
        while let Some(page) = pages.try_next().await? {
            stats.pages_fetched += 1;
            stats.records_dropped += page.dropped;
            if emit {
                let extracted_at = Utc::now();
                for record in &page.records {
                    self.emit_record(stream, record, extracted_at)?;
                }
                emitted += page.records.len() as u64;
                self.emit_state().await?;
            }
            self.check_running()?;
        }

        stats.records_emitted += emitted;
        self.finish_full_table(profile_id, stream, emit, emitted).await
    }

    /// Report stream: one report per date window, bookmark advanced per window
    async fn sync_report(
        &self,
        profile_id: &ProfileId,
        stream: &Arc<StreamDefinition>,
        selection: &Selection,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let emit = selection.should_emit(&stream.name);
        let key = stream.replication_key.as_deref().unwrap_or("date");
        let bookmark = self.state.cursor(&stream.name, profile_id.as_str()).await;
        let today = Utc::now().date_naive();

        let Some((start, end)) = report_range(
            bookmark.as_deref(),
            self.options.start_date,
            today,
            self.options.report_lookback_days,
        ) else {
            info!(profile_id = %profile_id, stream = %stream.name, "Report stream up to date");
            return Ok(());
        };

        let runner = ReportRunner::new(
            Arc::clone(&self.client),
            Arc::clone(stream),
            profile_id.clone(),
            self.options.poll,
        )?;

        for window in DateWindowRouter::new(start, end, self.options.report_window_days).windows() {
            self.check_running()?;
            let records = runner.run_window(&window).await?;
            stats.pages_fetched += 1;
            stats.reports_downloaded += 1;

            let high_water = max_cursor(&records, key);
            if emit {
                let extracted_at = Utc::now();
                for record in &records {
                    self.emit_record(stream, record, extracted_at)?;
                }
                stats.records_emitted += records.len() as u64;
            }
            if let Some(value) = high_water {
                self.state
                    .advance_cursor(&stream.name, profile_id.as_str(), &value)
                    .await;
            }
            if emit {
                self.emit_state().await?;
            }
        }

        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn finish_full_table(
        &self,
        profile_id: &ProfileId,
        stream: &StreamDefinition,
        emit: bool,
        emitted: u64,
    ) -> Result<()> {
        if emit {
            self.state
                .mark_synced(&stream.name, profile_id.as_str(), Utc::now())
                .await;
            self.emit_state().await?;
        }
        info!(profile_id = %profile_id, stream = %stream.name, records = emitted, "Stream complete");
        Ok(())
    }

    fn emit_record(
        &self,
        stream: &StreamDefinition,
        record: &Value,
        extracted_at: DateTime<Utc>,
    ) -> Result<()> {
        self.sink.write(&Message::record(
            stream.name.clone(),
            conform(record, &stream.schema),
            extracted_at,
        ))
    }

    async fn emit_state(&self) -> Result<()> {
        self.sink.write(&Message::state(self.state.to_json().await))
    }

    fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.aborted.load(Ordering::SeqCst)
    }

    fn check_running(&self) -> Result<()> {
        if self.should_stop() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
