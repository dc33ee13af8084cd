use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::entry::AuditEntry;

/// Audit sink operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditSinkError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for audit entries.
///
/// Implementations must never mutate or delete previously appended entries.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditSinkError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn append(&self, entry: AuditEntry) -> Result<(), AuditSinkError> {
        (**self).append(entry)
    }
}

/// Sink that drops every entry. For tests and tooling that runs without an
/// audit store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _entry: AuditEntry) -> Result<(), AuditSinkError> {
        Ok(())
    }
}

/// Best-effort audit writer.
///
/// `record` never fails: a sink error is logged to the operational channel
/// and swallowed, so the caller's primary operation is unaffected.
#[derive(Clone)]
pub struct AuditWriter {
    sink: Arc<dyn AuditSink>,
}

impl AuditWriter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// A writer that discards everything.
    pub fn disabled() -> Self {
        Self {
            sink: Arc::new(NullAuditSink),
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.sink.append(entry) {
            warn!(error = %e, action = %action, "audit write failed; continuing");
        }
    }
}

impl core::fmt::Debug for AuditWriter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditWriter").finish_non_exhaustive()
    }
}
