//! Response decoder module
//!
//! Supports: JSON (list endpoints) and gzip-compressed JSON (report downloads)
//!
//! # Overview
//!
//! Each decoder extracts records from a response body using a configured
//! record path, e.g. `$.campaigns` for the campaign list endpoint.

mod decoders;
mod types;

pub use decoders::{value_at, GzipJsonDecoder, JsonDecoder};
pub use types::{DecoderConfig, DecoderFormat, RecordDecoder};

#[cfg(test)]
mod tests;
