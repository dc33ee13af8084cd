//! Audit log storage.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use helmcrm_audit::{AuditEntry, AuditSink, AuditSinkError};
use helmcrm_core::UserId;

/// Filter for audit queries. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<UserId>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(user_id) = self.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if entry.resource != *resource {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if entry.action != *action {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        true
    }
}

/// In-memory append-only audit log.
///
/// Entries are never updated or deleted; queries return newest first.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        // Append-only storage: reverse iteration yields newest first.
        let mut matching: Vec<AuditEntry> = entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        matching
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditSinkError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditSinkError::Unavailable("lock poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }
}

/// Sink that fails every append. Exercises the best-effort write path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn append(&self, _entry: AuditEntry) -> Result<(), AuditSinkError> {
        Err(AuditSinkError::Unavailable(
            "injected audit failure".to_string(),
        ))
    }
}
