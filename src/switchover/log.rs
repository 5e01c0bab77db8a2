//! Append-only log of forwarding attempts.

use serde::{Serialize, Serializer};

use crate::backend::BackendId;

/// Result of one physical forwarding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The backend answered with this HTTP status.
    Http(u16),
    /// No answer within the forwarding timeout.
    Timeout,
    /// Connection refused, reset, or any other transport failure.
    Error,
}

impl AttemptStatus {
    /// Server errors and transport failures count against the switchover.
    pub fn is_failure(&self) -> bool {
        match self {
            AttemptStatus::Http(code) => *code >= 500,
            AttemptStatus::Timeout | AttemptStatus::Error => true,
        }
    }
}

impl Serialize for AttemptStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttemptStatus::Http(code) => serializer.serialize_u16(*code),
            AttemptStatus::Timeout => serializer.serialize_str("timeout"),
            AttemptStatus::Error => serializer.serialize_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    /// Attempt start, in epoch milliseconds.
    pub timestamp: u64,
    pub backend: BackendId,
    pub status: AttemptStatus,
    pub latency_ms: u64,
}

impl RequestLogEntry {
    pub fn completed_at(&self) -> u64 {
        self.timestamp.saturating_add(self.latency_ms)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    entries: Vec<RequestLogEntry>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RequestLogEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> &[RequestLogEntry] {
        let start = self.entries.len().saturating_sub(limit);
        &self.entries[start..]
    }

    /// Entries whose timestamp falls in `[start, end]`.
    pub fn within(&self, start: u64, end: u64) -> impl Iterator<Item = &RequestLogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.timestamp >= start && e.timestamp <= end)
    }
}
