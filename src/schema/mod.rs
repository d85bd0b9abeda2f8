//! Stream schema module
//!
//! Declared JSON schemas for every stream and record conformance.
//!
//! # Features
//!
//! - **Schema Types**: JSON Schema documents emitted by `discover` and in
//!   `SCHEMA` messages
//! - **Conformance**: projects records onto the declared properties and
//!   coerces numeric strings (report downloads carry them)

mod conform;
mod types;

pub use conform::{conform, conform_value};
pub use types::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
