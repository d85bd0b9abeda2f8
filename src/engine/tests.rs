//! Tests for the engine module

use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig};
use crate::output::{MemorySink, Message};
use crate::partition::DateWindow;
use crate::streams::Catalog;
use crate::types::ProfileId;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_case::test_case;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const KEYWORD_MEDIA: &str = "application/vnd.spKeyword.v3+json";

fn client(server: &MockServer) -> Arc<HttpClient> {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(1)
        .backoff(
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .no_rate_limit()
        .build();
    Arc::new(HttpClient::with_config(config).unwrap())
}

fn stream(name: &str) -> Arc<StreamDefinition> {
    Arc::new(Catalog::amazon_ads().get(name).unwrap().clone())
}

fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(2),
        max_attempts: 3,
    }
}

fn gzip(value: &Value) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(value.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

// ============================================================================
// Fetcher
// ============================================================================

#[tokio::test]
async fn test_fetcher_follows_next_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .and(body_partial_json(json!({"nextToken": "t1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [{"campaignId": "C3"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .and(header("Accept", "application/vnd.spCampaign.v3+json"))
        .and(header("Amazon-Advertising-API-Scope", "42"))
        .and(body_partial_json(json!({
            "maxResults": 2,
            "stateFilter": {"include": ["ENABLED", "PAUSED", "ARCHIVED"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [{"campaignId": "C1"}, {"campaignId": "C2"}],
            "nextToken": "t1"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = PaginatedFetcher::new(
        client(&mock_server),
        stream("campaigns"),
        ProfileId::new("42"),
        2,
    );
    let pages: Vec<Page> = fetcher.pages().try_collect().await.unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].number, 1);
    assert_eq!(pages[0].records.len(), 2);
    assert_eq!(pages[1].number, 2);
    assert_eq!(pages[1].records, vec![json!({"campaignId": "C3"})]);
}

#[tokio::test]
async fn test_fetcher_stops_on_empty_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [],
            "nextToken": "dangling"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pages: Vec<Page> = PaginatedFetcher::new(
        client(&mock_server),
        stream("campaigns"),
        ProfileId::new("1"),
        100,
    )
    .pages()
    .try_collect()
    .await
    .unwrap();

    assert_eq!(pages.len(), 1);
    assert!(pages[0].records.is_empty());
}

#[test]
fn test_request_body_without_pagination_has_no_max_results() {
    let mock_server_uri = "http://localhost:1";
    let config = HttpClientConfig::builder().base_url(mock_server_uri).build();
    let client = Arc::new(HttpClient::with_config(config).unwrap());

    let fetcher = PaginatedFetcher::new(client, stream("campaign_budgets"), ProfileId::new("1"), 50)
        .with_filter(ParentFilter {
            field: "campaignIds".to_string(),
            value: json!(["C1"]),
        });
    let body = fetcher.request_body();

    assert!(!body.contains_key("maxResults"));
    assert!(!body.contains_key("stateFilter"));
    assert_eq!(body.get("campaignIds"), Some(&json!(["C1"])));
}

// ============================================================================
// Parent / Child
// ============================================================================

#[tokio::test]
async fn test_parent_iterator_links() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [{"campaignId": 11}, {"name": "no id"}, {"campaignId": "C2"}]
        })))
        .mount(&mock_server)
        .await;

    let parents: Vec<ParentRecord> = ParentIterator::new(
        client(&mock_server),
        stream("campaigns"),
        ProfileId::new("1"),
        100,
    )
    .records()
    .try_collect()
    .await
    .unwrap();

    let links: Vec<Option<String>> = parents.into_iter().map(|p| p.link).collect();
    assert_eq!(links, vec![Some("11".to_string()), None, Some("C2".to_string())]);
}

#[tokio::test]
async fn test_child_batches_respect_cap() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/keywords/list"))
        .and(header("Accept", KEYWORD_MEDIA))
        .and(body_partial_json(json!({"campaignIdFilter": {"include": ["C1", "C2"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keywords": [
                {"keywordId": "K1", "campaignId": "C1"},
                {"keywordId": "K2", "campaignId": "C2"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sp/keywords/list"))
        .and(body_partial_json(json!({"campaignIdFilter": {"include": ["C3"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keywords": [{"keywordId": "K3", "campaignId": "C3"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let iterator = ChildIterator::new(
        client(&mock_server),
        stream("keywords"),
        ProfileId::new("1"),
        100,
        2,
    )
    .unwrap();
    let pages: Vec<ChildPage> = iterator
        .pages(ids(&["C1", "C2", "C3"]))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].batch, 0);
    assert_eq!(pages[1].batch, 1);
    let keywords: Vec<&str> = pages
        .iter()
        .flat_map(|p| p.records.iter())
        .filter_map(|r| r["keywordId"].as_str())
        .collect();
    assert_eq!(keywords, vec!["K1", "K2", "K3"]);
}

#[tokio::test]
async fn test_child_drops_records_outside_batch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/keywords/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keywords": [
                {"keywordId": "K1", "campaignId": "C1"},
                {"keywordId": "K9", "campaignId": "C9"},
                {"keywordId": "K0"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let iterator = ChildIterator::new(
        client(&mock_server),
        stream("keywords"),
        ProfileId::new("1"),
        100,
        10,
    )
    .unwrap();
    let pages: Vec<ChildPage> = iterator.pages(ids(&["C1"])).try_collect().await.unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].records, vec![json!({"keywordId": "K1", "campaignId": "C1"})]);
    assert_eq!(pages[0].dropped, 2);
}

#[tokio::test]
async fn test_child_without_parents_makes_no_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let iterator = ChildIterator::new(
        client(&mock_server),
        stream("keywords"),
        ProfileId::new("1"),
        100,
        10,
    )
    .unwrap();
    let pages: Vec<ChildPage> = iterator.pages(Vec::new()).try_collect().await.unwrap();
    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_id_list_child_budgets() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/budget/usage"))
        .and(header("Accept", "application/vnd.spCampaignBudget.v3+json"))
        .and(body_partial_json(json!({"campaignIds": ["C1", "C2"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": [
                {"index": 0, "campaignId": "C1", "budget": 10.0},
                {"index": 1, "campaignId": "C2", "budget": 5.5}
            ],
            "error": [{"index": 2, "code": "NOT_FOUND"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let iterator = ChildIterator::new(
        client(&mock_server),
        stream("campaign_budgets"),
        ProfileId::new("1"),
        100,
        100,
    )
    .unwrap();
    let pages: Vec<ChildPage> = iterator.pages(ids(&["C1", "C2"])).try_collect().await.unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].records.len(), 2);
    assert_eq!(pages[0].dropped, 0);
}

#[test]
fn test_child_iterator_requires_parent_link() {
    let config = HttpClientConfig::builder().build();
    let client = Arc::new(HttpClient::with_config(config).unwrap());
    let err = ChildIterator::new(client, stream("campaigns"), ProfileId::new("1"), 10, 10)
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

// ============================================================================
// Reports
// ============================================================================

fn window() -> DateWindow {
    DateWindow {
        start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
    }
}

async fn mount_report_flow(server: &MockServer, report_id: &str, rows: &Value) {
    Mock::given(method("GET"))
        .and(path(format!("/reporting/reports/{report_id}")))
        .and(header("Accept", "*/*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reportId": report_id,
            "status": "PENDING"
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/reporting/reports/{report_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reportId": report_id,
            "status": "COMPLETED",
            "url": format!("{}/download/{report_id}.json.gz", server.uri())
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/download/{report_id}.json.gz")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(rows)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_report_create_poll_download() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/reporting/reports"))
        .and(header("Content-Type", "application/vnd.createasyncreportrequest.v3+json"))
        .and(body_partial_json(json!({
            "startDate": "2024-05-01",
            "endDate": "2024-05-02",
            "configuration": {"reportTypeId": "spCampaigns", "format": "GZIP_JSON"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reportId": "r-1",
            "status": "PENDING"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_report_flow(
        &mock_server,
        "r-1",
        &json!([
            {"date": "2024-05-01", "campaignId": 7, "impressions": "12", "cost": 1.5, "unknown": 1},
            {"date": "2024-05-02", "campaignId": 7, "impressions": 3}
        ]),
    )
    .await;

    let runner = ReportRunner::new(
        client(&mock_server),
        stream("campaign_performance_report"),
        ProfileId::new("1"),
        fast_poll(),
    )
    .unwrap();
    let records = runner.run_window(&window()).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["impressions"], json!("12"));
    assert_eq!(
        crate::schema::conform(&records[0], &stream("campaign_performance_report").schema),
        json!({"date": "2024-05-01", "campaignId": "7", "impressions": 12, "cost": 1.5})
    );
    assert_eq!(max_cursor(&records, "date").as_deref(), Some("2024-05-02"));
}

#[test_case(409 ; "conflict")]
#[test_case(425 ; "too early")]
#[tokio::test]
async fn test_duplicate_report_is_reused(status: u16) {
    let mock_server = MockServer::start().await;
    let existing = "0bd6a1a4-8a4d-4b33-9a55-9a7b2b5d0f11";

    Mock::given(method("POST"))
        .and(path("/reporting/reports"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "code": status.to_string(),
            "detail": format!("The Request is a duplicate of : {existing}")
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_report_flow(&mock_server, existing, &json!([{"date": "2024-05-01"}])).await;

    let runner = ReportRunner::new(
        client(&mock_server),
        stream("campaign_performance_report"),
        ProfileId::new("1"),
        fast_poll(),
    )
    .unwrap();
    let records = runner.run_window(&window()).await.unwrap();
    assert_eq!(records, vec![json!({"date": "2024-05-01"})]);
}

#[tokio::test]
async fn test_report_failure_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reporting/reports/r-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "FAILURE",
            "failureReason": "Internal error"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let runner = ReportRunner::new(
        client(&mock_server),
        stream("campaign_performance_report"),
        ProfileId::new("1"),
        fast_poll(),
    )
    .unwrap();
    let err = runner.wait("r-9").await.unwrap_err();

    assert!(matches!(err, Error::Report { ref report_id, .. } if report_id == "r-9"));
    assert!(err.to_string().contains("Internal error"));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_report_polling_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reporting/reports/r-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PROCESSING"})))
        .expect(3)
        .mount(&mock_server)
        .await;

    let runner = ReportRunner::new(
        client(&mock_server),
        stream("campaign_performance_report"),
        ProfileId::new("1"),
        fast_poll(),
    )
    .unwrap();
    let err = runner.wait("r-2").await.unwrap_err();
    assert!(err.to_string().contains("3 status checks"));
}

#[test]
fn test_duplicate_report_id() {
    assert_eq!(
        duplicate_report_id(
            r#"{"detail":"The Request is a duplicate of : 0BD6A1A4-8A4D-4B33-9A55-9A7B2B5D0F11"}"#
        )
        .as_deref(),
        Some("0bd6a1a4-8a4d-4b33-9a55-9a7b2b5d0f11")
    );
    assert!(duplicate_report_id("quota exceeded").is_none());
}

#[test]
fn test_poll_delay_backs_off_to_cap() {
    let poll = PollSettings::default();
    assert_eq!(poll.delay(0), Duration::from_secs(5));
    assert_eq!(poll.delay(2), Duration::from_secs(20));
    assert_eq!(poll.delay(4), Duration::from_secs(60));
    assert_eq!(poll.delay(200), Duration::from_secs(60));
}

#[test]
fn test_report_range() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let day = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();

    // No bookmark, no start date: full lookback
    assert_eq!(report_range(None, None, today, 60), Some((day(5, 1), today)));

    // Bookmark inside the lookback restarts on the bookmark date
    assert_eq!(
        report_range(Some("2024-06-20"), None, today, 60),
        Some((day(6, 20), today))
    );

    // Old bookmark is floored at the lookback
    assert_eq!(
        report_range(Some("2023-01-01"), None, today, 60),
        Some((day(5, 1), today))
    );

    // Start date used when there is no bookmark
    let start = Utc.with_ymd_and_hms(2024, 6, 25, 0, 0, 0).unwrap();
    assert_eq!(
        report_range(None, Some(start), today, 60),
        Some((day(6, 25), today))
    );

    // Future start date leaves nothing to do
    let future = Utc.with_ymd_and_hms(2024, 7, 5, 0, 0, 0).unwrap();
    assert_eq!(report_range(None, Some(future), today, 60), None);
}

// ============================================================================
// Sync Engine
// ============================================================================

fn tap_config(server: &MockServer, profiles: &[&str]) -> TapConfig {
    TapConfig::from_value(json!({
        "client_id": "cid",
        "client_secret": "secret",
        "refresh_token": "refresh",
        "profile_ids": profiles,
        "api_url": server.uri(),
        "report_lookback_days": 1
    }))
    .unwrap()
}

#[tokio::test]
async fn test_engine_emits_selected_child_only() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [{"campaignId": "C1"}, {"campaignId": "C2"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sp/keywords/list"))
        .and(body_partial_json(json!({"campaignIdFilter": {"include": ["C1", "C2"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keywords": [
                {"keywordId": "K1", "campaignId": "C1", "bid": "0.75"},
                {"keywordId": "K2", "campaignId": "C2"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = tap_config(&mock_server, &["1"]);
    let sink = Arc::new(MemorySink::new());
    let engine = SyncEngine::new(
        &config,
        client(&mock_server),
        StateManager::in_memory(),
        sink.clone(),
    );

    let report = engine.run(&["keywords".to_string()]).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.stats.records_emitted, 2);

    let messages = sink.messages();
    assert!(matches!(&messages[0], Message::Schema { stream, .. } if stream == "keywords"));
    assert!(messages.iter().all(|m| m.stream() != Some("campaigns")));

    let keywords = sink.records("keywords");
    assert_eq!(keywords[0]["bid"], json!(0.75));

    let state = sink.last_state().unwrap();
    assert!(state["bookmarks"]["keywords"]["1"]["synced_at"].is_string());
    assert!(state["bookmarks"].get("campaigns").is_none());
}

#[tokio::test]
async fn test_engine_report_advances_bookmark() {
    let mock_server = MockServer::start().await;
    let today = Utc::now().date_naive();
    let yesterday = today - ChronoDuration::days(1);

    Mock::given(method("POST"))
        .and(path("/reporting/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reportId": "r-5"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_report_flow(
        &mock_server,
        "r-5",
        &json!([
            {"date": today.format("%Y-%m-%d").to_string(), "campaignId": "1", "clicks": 2},
            {"date": yesterday.format("%Y-%m-%d").to_string(), "campaignId": "1", "clicks": 4}
        ]),
    )
    .await;

    let config = tap_config(&mock_server, &["1"]);
    let sink = Arc::new(MemorySink::new());
    let options = SyncOptions::from_config(&config).with_poll(fast_poll());
    let engine = SyncEngine::new(
        &config,
        client(&mock_server),
        StateManager::in_memory(),
        sink.clone(),
    )
    .with_options(options);

    let report = engine
        .run(&["campaign_performance_report".to_string()])
        .await
        .unwrap();

    assert_eq!(report.stats.reports_downloaded, 1);
    assert_eq!(sink.records("campaign_performance_report").len(), 2);
    assert_eq!(
        engine
            .state()
            .cursor("campaign_performance_report", "1")
            .await
            .as_deref(),
        Some(today.format("%Y-%m-%d").to_string().as_str())
    );
}

#[tokio::test]
async fn test_engine_failed_parent_fails_children() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sp/keywords/list"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = tap_config(&mock_server, &["1"]);
    let engine = SyncEngine::new(
        &config,
        client(&mock_server),
        StateManager::in_memory(),
        Arc::new(MemorySink::new()),
    );

    let report = engine
        .run(&["campaigns".to_string(), "keywords".to_string()])
        .await
        .unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.failure("1", "campaigns").map(|f| &f.error),
        Some(Error::HttpStatus { status: 400, .. })
    ));
    assert!(report.failure("1", "keywords").is_some());
}

#[tokio::test]
async fn test_engine_cancelled_before_start() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = tap_config(&mock_server, &["1", "2"]);
    let sink = Arc::new(MemorySink::new());
    let engine = SyncEngine::new(
        &config,
        client(&mock_server),
        StateManager::in_memory(),
        sink.clone(),
    );
    engine.cancellation().store(true, Ordering::SeqCst);

    let report = engine.run(&[]).await.unwrap();
    assert!(report.cancelled);
    assert!(!report.is_success());
    assert!(sink.last_state().is_some());
}

/// First campaigns page; raises the interrupt flag as it is served
struct InterruptAfterFirstPage {
    flag: Arc<AtomicBool>,
}

impl Respond for InterruptAfterFirstPage {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.flag.store(true, Ordering::SeqCst);
        ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [{"campaignId": "C1"}, {"campaignId": "C2"}],
            "nextToken": "t1"
        }))
    }
}

#[tokio::test]
async fn test_engine_interrupted_mid_stream_keeps_bookmark_unset() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    let flag = Arc::new(AtomicBool::new(false));

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .and(body_partial_json(json!({"nextToken": "t1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "campaigns": [{"campaignId": "C3"}]
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sp/campaigns/list"))
        .respond_with(InterruptAfterFirstPage {
            flag: Arc::clone(&flag),
        })
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = tap_config(&mock_server, &["1"]);
    let sink = Arc::new(MemorySink::new());
    let engine = SyncEngine::new(
        &config,
        client(&mock_server),
        StateManager::new(&state_path),
        sink.clone(),
    )
    .with_cancellation(Arc::clone(&flag));

    let report = engine.run(&["campaigns".to_string()]).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.stats.streams_completed, 0);
    assert_eq!(sink.records("campaigns").len(), 2);

    let last_state = sink.last_state().unwrap();
    assert!(last_state["bookmarks"]
        .get("campaigns")
        .and_then(|b| b.get("1"))
        .and_then(|b| b.get("synced_at"))
        .is_none());

    let persisted: Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(persisted, last_state);
}

#[tokio::test]
async fn test_engine_concurrent_profiles_checkpoint_to_one_file() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");

    for profile in ["1", "2", "3"] {
        let campaign = format!("C{profile}");
        Mock::given(method("POST"))
            .and(path("/sp/campaigns/list"))
            .and(header("Amazon-Advertising-API-Scope", profile))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"campaigns": [{"campaignId": campaign}]}))
                    .set_delay(Duration::from_millis(20)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/sp/keywords/list"))
            .and(header("Amazon-Advertising-API-Scope", profile))
            .and(body_partial_json(json!({"campaignIdFilter": {"include": [campaign]}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "keywords": [{"keywordId": format!("K{profile}"), "campaignId": campaign}]
                    }))
                    .set_delay(Duration::from_millis(20)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let mut config = tap_config(&mock_server, &["1", "2", "3"]);
    config.max_concurrent_profiles = 3;
    let sink = Arc::new(MemorySink::new());
    let engine = SyncEngine::new(
        &config,
        client(&mock_server),
        StateManager::new(&state_path),
        sink.clone(),
    );

    let report = engine
        .run(&["campaigns".to_string(), "keywords".to_string()])
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.stats.streams_completed, 6);
    assert_eq!(sink.records("keywords").len(), 3);

    let persisted = StateManager::from_file(&state_path).unwrap().snapshot().await;
    for profile in ["1", "2", "3"] {
        for stream in ["campaigns", "keywords"] {
            assert!(
                persisted.bookmark(stream, profile).and_then(|b| b.synced_at).is_some(),
                "{stream}/{profile} not persisted"
            );
        }
    }
    assert!(!state_path.with_extension("tmp").exists());
}
