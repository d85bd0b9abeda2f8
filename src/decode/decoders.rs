//! Decoder implementations
//!
//! Each decoder handles a specific response format.

use super::types::RecordDecoder;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::io::Read;

// ============================================================================
// JSON Decoder
// ============================================================================

/// JSON decoder with optional record path extraction
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    /// JSONPath to extract records
    record_path: Option<String>,
}

impl JsonDecoder {
    /// Create a new JSON decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            record_path: Some(path.into()),
        }
    }

    /// Extract records from an already parsed value
    pub fn extract_records(&self, value: &Value) -> Result<Vec<Value>> {
        match &self.record_path {
            Some(path) if path.contains('*') || path.contains("..") => {
                extract_with_jsonpath(value, path)
            }
            Some(path) => match value_at(value, path) {
                Some(Value::Array(arr)) => Ok(arr.clone()),
                Some(Value::Null) | None => Ok(vec![]),
                Some(v) => Ok(vec![v.clone()]),
            },
            None => match value {
                Value::Array(arr) => Ok(arr.clone()),
                Value::Null => Ok(vec![]),
                _ => Ok(vec![value.clone()]),
            },
        }
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<Value>> {
        let value = self.decode_raw(body)?;
        self.extract_records(&value)
    }

    fn decode_raw(&self, body: &[u8]) -> Result<Value> {
        serde_json::from_slice(body).map_err(|e| Error::Decode {
            message: format!("Failed to parse JSON: {e}"),
        })
    }
}

// ============================================================================
// Gzip JSON Decoder
// ============================================================================

/// Gzip-compressed JSON, as served by completed report downloads
#[derive(Debug, Clone, Default)]
pub struct GzipJsonDecoder {
    inner: JsonDecoder,
}

impl GzipJsonDecoder {
    /// Wrap a JSON decoder
    pub fn new(inner: JsonDecoder) -> Self {
        Self { inner }
    }

    fn inflate(body: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(body);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(|e| Error::Decode {
            message: format!("Failed to decompress gzip body: {e}"),
        })?;
        Ok(out)
    }
}

impl RecordDecoder for GzipJsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<Value>> {
        let value = self.decode_raw(body)?;
        self.inner.extract_records(&value)
    }

    fn decode_raw(&self, body: &[u8]) -> Result<Value> {
        let inflated = Self::inflate(body)?;
        self.inner.decode_raw(&inflated)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Look up a value by simple dot-notation path (`$.a.b`, `a.b`, `items[0]`)
pub fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);
    if path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        if let Some(bracket_pos) = part.find('[') {
            let name = &part[..bracket_pos];
            let index = part[bracket_pos + 1..].strip_suffix(']')?.parse::<usize>().ok()?;
            if !name.is_empty() {
                current = current.get(name)?;
            }
            current = current.get(index)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current)
}

/// Extract records using jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid JSONPath {path}: {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
