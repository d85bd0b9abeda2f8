//! Tests for the stream catalog

use super::*;
use crate::partition::DateWindow;
use crate::schema::JsonType;
use crate::types::{Method, ReplicationMethod};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_catalog_order_parents_first() {
    let catalog = Catalog::amazon_ads();
    let names = catalog.names();
    assert_eq!(names.len(), 12);

    for stream in catalog.streams() {
        if let Some(link) = &stream.parent {
            let parent_pos = names.iter().position(|n| *n == link.parent).unwrap();
            let child_pos = names.iter().position(|n| *n == stream.name).unwrap();
            assert!(parent_pos < child_pos, "{} before {}", link.parent, stream.name);
        }
    }
}

#[test]
fn test_campaigns_definition() {
    let catalog = Catalog::amazon_ads();
    let campaigns = catalog.get("campaigns").unwrap();

    assert_eq!(campaigns.method, Method::POST);
    assert_eq!(campaigns.path, "/sp/campaigns/list");
    assert_eq!(campaigns.media_type, "application/vnd.spCampaign.v3+json");
    assert_eq!(campaigns.record_path, "$.campaigns");
    assert_eq!(campaigns.key_properties, vec!["campaignId"]);
    assert_eq!(campaigns.id_field.as_deref(), Some("campaignId"));
    assert_eq!(
        campaigns.body.get("stateFilter"),
        Some(&json!({"include": ["ENABLED", "PAUSED", "ARCHIVED"]}))
    );
    assert!(campaigns.parent.is_none());
    assert!(!campaigns.is_report());
}

#[test]
fn test_child_links() {
    let catalog = Catalog::amazon_ads();

    let keywords = catalog.get("keywords").unwrap();
    let link = keywords.parent.as_ref().unwrap();
    assert_eq!(link.parent, "campaigns");
    assert_eq!(link.filter_field, "campaignIdFilter");
    assert_eq!(link.parent_key, "campaignId");
    assert_eq!(link.batch_style, BatchStyle::IncludeFilter);

    let productads = catalog.get("productads").unwrap();
    assert_eq!(productads.parent.as_ref().unwrap().parent, "adgroups");

    let budgets = catalog.get("campaign_budgets").unwrap();
    let link = budgets.parent.as_ref().unwrap();
    assert_eq!(link.batch_style, BatchStyle::IdList);
    assert!(budgets.body.is_empty());
}

#[test]
fn test_filter_value_shapes() {
    let ids = vec!["C1".to_string(), "C2".to_string()];
    assert_eq!(
        ParentLink::include("campaigns", "campaignIdFilter", "campaignId").filter_value(&ids),
        json!({"include": ["C1", "C2"]})
    );
    assert_eq!(
        ParentLink::id_list("campaigns", "campaignIds", "campaignId").filter_value(&ids),
        json!(["C1", "C2"])
    );
}

#[test]
fn test_report_streams_are_incremental_on_date() {
    let catalog = Catalog::amazon_ads();
    let reports: Vec<_> = catalog.streams().iter().filter(|s| s.is_report()).collect();
    assert_eq!(reports.len(), 5);

    for stream in reports {
        assert_eq!(stream.replication_method, ReplicationMethod::Incremental);
        assert_eq!(stream.replication_key.as_deref(), Some("date"));
        let report = stream.report.as_ref().unwrap();
        assert!(report.columns.iter().any(|c| c == "date"), "{}", stream.name);
        for key in &stream.key_properties {
            assert!(stream.schema.get_property(key).is_some(), "{}.{key}", stream.name);
        }
    }
}

#[test]
fn test_report_column_types() {
    let catalog = Catalog::amazon_ads();
    let schema = &catalog.get("campaign_performance_report").unwrap().schema;

    let primary = |name: &str| schema.get_property(name).unwrap().json_type.primary_type();
    assert_eq!(primary("impressions"), Some(JsonType::Integer));
    assert_eq!(primary("unitsSoldClicks14d"), Some(JsonType::Integer));
    assert_eq!(primary("cost"), Some(JsonType::Number));
    assert_eq!(primary("sales7d"), Some(JsonType::Number));
    assert_eq!(primary("clickThroughRate"), Some(JsonType::Number));
    assert_eq!(primary("campaignBudgetAmount"), Some(JsonType::Number));
    assert_eq!(primary("campaignId"), Some(JsonType::String));
    assert_eq!(primary("campaignBudgetCurrencyCode"), Some(JsonType::String));
    assert_eq!(
        schema.get_property("date").unwrap().format.as_deref(),
        Some("date")
    );
}

#[test]
fn test_report_payload() {
    let catalog = Catalog::amazon_ads();
    let report = catalog
        .get("keywords_targeting_summary_report")
        .unwrap()
        .report
        .clone()
        .unwrap();
    let window = DateWindow {
        start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
    };

    let payload = report.payload("report-1", &window);
    assert_eq!(payload["name"], "report-1");
    assert_eq!(payload["startDate"], "2024-05-01");
    assert_eq!(payload["endDate"], "2024-05-31");
    assert_eq!(payload["configuration"]["reportTypeId"], "spTargeting");
    assert_eq!(payload["configuration"]["adProduct"], "SPONSORED_PRODUCTS");
    assert_eq!(payload["configuration"]["groupBy"], json!(["targeting"]));
    assert_eq!(payload["configuration"]["timeUnit"], "DAILY");
    assert_eq!(payload["configuration"]["format"], "GZIP_JSON");
    assert_eq!(payload["configuration"]["filters"][1]["field"], "adKeywordStatus");
}

#[test]
fn test_report_payload_without_filters() {
    let catalog = Catalog::amazon_ads();
    let report = catalog
        .get("campaign_performance_report")
        .unwrap()
        .report
        .clone()
        .unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let payload = report.payload("r", &DateWindow { start: day, end: day });
    assert!(payload["configuration"].get("filters").is_none());
}

#[test]
fn test_select_all() {
    let selection = Catalog::amazon_ads().select(&[]).unwrap();
    assert_eq!(selection.run.len(), 12);
    assert!(selection.should_emit("productads"));
}

#[test]
fn test_select_child_pulls_in_parent_without_emitting_it() {
    let selection = Catalog::amazon_ads()
        .select(&["keywords".to_string()])
        .unwrap();

    let run: Vec<_> = selection.run.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(run, vec!["campaigns", "keywords"]);
    assert!(selection.should_emit("keywords"));
    assert!(!selection.should_emit("campaigns"));
    assert!(selection.has_children("campaigns"));
    assert!(!selection.has_children("keywords"));
}

#[test]
fn test_select_unknown_stream() {
    let err = Catalog::amazon_ads()
        .select(&["sponsored_brands".to_string()])
        .unwrap_err();
    assert!(matches!(err, crate::error::Error::StreamNotFound { ref stream } if stream == "sponsored_brands"));
}

#[test]
fn test_discover_output() {
    let catalog = Catalog::amazon_ads().to_json();
    let streams = catalog["streams"].as_array().unwrap();
    assert_eq!(streams.len(), 12);

    let keywords = streams
        .iter()
        .find(|s| s["stream"] == "keywords")
        .unwrap();
    assert_eq!(keywords["key_properties"], json!(["keywordId"]));
    assert_eq!(keywords["replication_method"], "FULL_TABLE");
    assert_eq!(keywords["parent_stream"], "campaigns");
    assert_eq!(keywords["schema"]["required"], json!(["keywordId"]));

    let report = streams
        .iter()
        .find(|s| s["stream"] == "search_terms_report")
        .unwrap();
    assert_eq!(report["replication_key"], "date");
    assert_eq!(report["replication_method"], "INCREMENTAL");
}
