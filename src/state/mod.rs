//! State management module
//!
//! Handles bookmark tracking and checkpointing between runs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - bookmarks keyed by stream, then by profile
//! - `Bookmark` - replication cursor and last full-table sync time
//! - `StateManager` - shared, file-backed persistence with atomic writes

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{compare_cursors, Bookmark, State};
