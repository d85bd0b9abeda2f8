//! Output module
//!
//! Serializes the record protocol: one JSON message per line on stdout.
//!
//! # Overview
//!
//! - `Message` - `SCHEMA`, `RECORD` and `STATE` messages
//! - `MessageSink` - where messages go (`StdoutSink` for runs, `MemorySink`
//!   for tests and embedding)

mod message;
mod sink;

pub use message::Message;
pub use sink::{MemorySink, MessageSink, StdoutSink};
