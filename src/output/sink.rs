//! Message sinks

use super::message::Message;
use crate::error::Result;
use serde_json::Value;
use std::io::Write;
use std::sync::Mutex;

/// Destination of protocol messages.
///
/// Profile workers share one sink, so implementations serialize writes.
pub trait MessageSink: Send + Sync {
    /// Write one message
    fn write(&self, message: &Message) -> Result<()>;

    /// Flush buffered output
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Stdout Sink
// ============================================================================

/// Writes JSON lines to stdout
#[derive(Debug, Default)]
pub struct StdoutSink {
    lock: Mutex<()>,
}

impl StdoutSink {
    /// Create a stdout sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageSink for StdoutSink {
    fn write(&self, message: &Message) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out = std::io::stdout().lock();
        serde_json::to_writer(&mut out, message)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<Message>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages written so far
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Record bodies of one stream, in emission order
    pub fn records(&self, stream: &str) -> Vec<Value> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Record {
                    stream: s, record, ..
                } if s == stream => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Last emitted state document
    pub fn last_state(&self) -> Option<Value> {
        self.messages().into_iter().rev().find_map(|m| match m {
            Message::State { value } => Some(value),
            _ => None,
        })
    }
}

impl MessageSink for MemorySink {
    fn write(&self, message: &Message) -> Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
