//! # Audit Log
//!
//! Append-only record of every delivery attempt. Recording is
//! fire-and-forget: a sink that fails must never fail or stall the campaign
//! run, so the trait surface is infallible and implementations swallow their
//! own errors.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::project::DeliveryStatus;

/// How many entries the bounded in-memory log retains.
pub const DEFAULT_RETENTION: usize = 1000;

/// One delivery attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub recipient_email: String,
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    /// Human-readable failure class ("render failed: ..." vs "transport
    /// rejected: ..."), absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditEntry {
    pub fn success(email: &str) -> Self {
        Self {
            recipient_email: email.to_string(),
            status: DeliveryStatus::Success,
            timestamp: Utc::now(),
            error_message: None,
        }
    }

    pub fn failure(email: &str, reason: impl Into<String>) -> Self {
        Self {
            recipient_email: email.to_string(),
            status: DeliveryStatus::Failure,
            timestamp: Utc::now(),
            error_message: Some(reason.into()),
        }
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one entry. Must not block the run on sink failures.
    async fn record(&self, entry: AuditEntry);
}

/// Bounded in-memory audit log, newest entries first.
#[derive(Debug)]
pub struct MemoryAuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    retention: usize,
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            retention,
        }
    }

    /// Snapshot of the retained entries, newest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) {
        // A poisoned lock means a panicking writer elsewhere; drop the entry
        // rather than propagate.
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_front(entry);
            entries.truncate(self.retention);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_newest_first() {
        let log = MemoryAuditLog::new();
        log.record(AuditEntry::success("first@x.com")).await;
        log.record(AuditEntry::failure("second@x.com", "transport rejected: 550"))
            .await;

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].recipient_email, "second@x.com");
        assert_eq!(entries[0].status, DeliveryStatus::Failure);
        assert_eq!(
            entries[0].error_message.as_deref(),
            Some("transport rejected: 550")
        );
        assert_eq!(entries[1].recipient_email, "first@x.com");
        assert!(entries[1].error_message.is_none());
    }

    #[tokio::test]
    async fn retention_is_bounded() {
        let log = MemoryAuditLog::with_retention(3);
        for i in 0..10 {
            log.record(AuditEntry::success(&format!("r{i}@x.com"))).await;
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].recipient_email, "r9@x.com");
        assert_eq!(entries[2].recipient_email, "r7@x.com");
    }
}
