//! Pagination module
//!
//! Supports: continuation token (`nextToken`) and single-page endpoints
//!
//! # Overview
//!
//! A paginator reads each response, records the continuation token in a
//! `PaginationState` and decides whether another request is needed. The
//! token lives only for the duration of one collection fetch.

mod strategies;
mod types;

pub use strategies::{NextTokenPaginator, NoPaginator};
pub use types::{NextPage, PaginationConfig, PaginationState, Paginator};
