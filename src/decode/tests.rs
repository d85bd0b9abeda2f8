//! Tests for decoder module

use super::*;
use crate::error::Error;
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_json_decoder_record_path() {
    let body = json!({
        "campaigns": [
            {"campaignId": "C1", "name": "Spring"},
            {"campaignId": "C2", "name": "Summer"}
        ],
        "nextToken": "abc"
    })
    .to_string();

    let records = JsonDecoder::with_path("$.campaigns")
        .decode(body.as_bytes())
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["campaignId"], "C2");
}

#[test]
fn test_json_decoder_missing_path_is_empty() {
    let body = br#"{"totalResults": 0}"#;
    let records = JsonDecoder::with_path("$.keywords").decode(body).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_json_decoder_wildcard_path() {
    let body = json!({"success": [{"index": 0, "campaignId": "C1"}, {"index": 1, "campaignId": "C2"}]})
        .to_string();
    let records = JsonDecoder::with_path("$.success[*]")
        .decode(body.as_bytes())
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn test_json_decoder_invalid_body() {
    let err = JsonDecoder::new().decode(b"<html>").unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn test_gzip_json_decoder() {
    let payload = json!([
        {"date": "2024-05-01", "campaignId": 1, "clicks": 4},
        {"date": "2024-05-02", "campaignId": 1, "clicks": 7}
    ])
    .to_string();

    let decoder = DecoderConfig::gzip_json().decoder();
    let records = decoder.decode(&gzip(payload.as_bytes())).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["clicks"], 7);
}

#[test]
fn test_gzip_decoder_rejects_plain_body() {
    let err = GzipJsonDecoder::default().decode(b"[1,2,3]").unwrap_err();
    assert!(err.to_string().contains("decompress"));
}

#[test]
fn test_value_at() {
    let value = json!({"a": {"b": [10, {"c": "deep"}]}, "nextToken": "t"});
    assert_eq!(value_at(&value, "$.nextToken"), Some(&json!("t")));
    assert_eq!(value_at(&value, "a.b[0]"), Some(&json!(10)));
    assert_eq!(value_at(&value, "$.a.b[1].c"), Some(&json!("deep")));
    assert_eq!(value_at(&value, "$"), Some(&value));
    assert_eq!(value_at(&value, "$.missing"), None);
}

#[test]
fn test_decoder_config_json_with_path() {
    let config = DecoderConfig::json_with_path("$.adGroups");
    assert_eq!(config.format, DecoderFormat::Json);
    let records = config
        .decoder()
        .decode(br#"{"adGroups": [{"adGroupId": "A1"}]}"#)
        .unwrap();
    assert_eq!(records, vec![json!({"adGroupId": "A1"})]);
}

#[test]
fn test_malformed_wildcard_path_is_jsonpath_error() {
    let err = JsonDecoder::with_path("$.success[*")
        .extract_records(&json!({"success": []}))
        .unwrap_err();
    assert!(matches!(err, Error::JsonPath { .. }));
}
