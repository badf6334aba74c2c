//! Structured messages posted from pages to a worker.

use serde::{Deserialize, Serialize};

/// A page-to-worker message, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate a waiting worker now instead of when every page has closed.
    SkipWaiting,
    /// Anything else; logged and ignored.
    #[serde(other)]
    Unknown,
}

impl WorkerMessage {
    /// Interpret an arbitrary JSON payload. Malformed payloads are `Unknown`.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(WorkerMessage::Unknown)
    }
}
