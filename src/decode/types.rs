//! Decoder types and traits
//!
//! Defines the core decoder abstractions.

use super::decoders::{GzipJsonDecoder, JsonDecoder};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format of the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Gzip-compressed JSON
    GzipJson,
}

/// Configuration for decoding responses
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Response format
    pub format: DecoderFormat,
    /// JSONPath to extract records from response
    pub record_path: Option<String>,
}

impl DecoderConfig {
    /// Create a JSON decoder config with a record path
    pub fn json_with_path(path: impl Into<String>) -> Self {
        Self {
            format: DecoderFormat::Json,
            record_path: Some(path.into()),
        }
    }

    /// Create a gzip JSON decoder config whose body is the record array
    pub fn gzip_json() -> Self {
        Self {
            format: DecoderFormat::GzipJson,
            record_path: None,
        }
    }

    /// Build the decoder described by this config
    pub fn decoder(&self) -> Box<dyn RecordDecoder> {
        let json = match &self.record_path {
            Some(path) => JsonDecoder::with_path(path),
            None => JsonDecoder::new(),
        };
        match self.format {
            DecoderFormat::Json => Box::new(json),
            DecoderFormat::GzipJson => Box::new(GzipJsonDecoder::new(json)),
        }
    }
}

/// Trait for decoding response bodies into records
pub trait RecordDecoder: Send + Sync {
    /// Decode the response body into a list of records
    fn decode(&self, body: &[u8]) -> Result<Vec<Value>>;

    /// Decode the response body into a single JSON value (full response)
    fn decode_raw(&self, body: &[u8]) -> Result<Value>;
}
