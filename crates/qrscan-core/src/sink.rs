//! Scan event sink - per-session dedupe of decoded payloads.
//!
//! A code that stays in frame is decoded on every attempt. The sink
//! remembers every payload reported in the session so it only reaches the
//! user once, for the whole lifetime of the session.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A decoded payload. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedResult {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl DecodedResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanEventSink {
    seen: HashSet<String>,
}

impl ScanEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a payload. Returns true if it was not seen before.
    pub fn record(&mut self, text: &str) -> bool {
        if self.seen.contains(text) {
            trace!(len = text.len(), "Duplicate payload suppressed");
            return false;
        }
        self.seen.insert(text.to_string());
        true
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget everything. Only session teardown calls this.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_is_novel() {
        let mut sink = ScanEventSink::new();
        assert!(sink.record("X"));
        assert!(!sink.record("X"));
        assert!(sink.record("Y"));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_new_sink_reports_again() {
        let mut first = ScanEventSink::new();
        assert!(first.record("X"));

        let mut second = ScanEventSink::new();
        assert!(second.record("X"));
    }

    #[test]
    fn test_clear() {
        let mut sink = ScanEventSink::new();
        sink.record("X");
        sink.clear();
        assert!(sink.is_empty());
        assert!(sink.record("X"));
    }
}
