//! Stream catalog
//!
//! Declarative definitions of every stream the tap extracts: endpoint,
//! media type, record path, keys, parent linkage and schema.
//!
//! # Overview
//!
//! - Entity streams page through the v3 list endpoints (`entities`)
//! - Report streams drive the asynchronous reporting API (`reports`)
//! - `Catalog` resolves stream selections and renders `discover` output

mod catalog;
mod entities;
mod reports;
mod types;

pub use catalog::{Catalog, Selection};
pub use types::{BatchStyle, ParentLink, ReportDefinition, ReportFilter, StreamDefinition};

#[cfg(test)]
mod tests;
