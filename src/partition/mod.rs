//! Partition routing module
//!
//! Supports: parent-id batches and report date windows
//!
//! # Overview
//!
//! Partitions split one logical fetch into several sequential sub-queries:
//! - child collections scoped to at most `cap` parent ids per request
//! - report date ranges sliced into windows the reporting API accepts

mod routers;

pub use routers::{BatchRouter, DateWindow, DateWindowRouter};
