//! Approval request storage.
//!
//! The approval row is the only resource in this core requiring per-row
//! compare-and-set discipline. Every status change goes through an atomic
//! conditional update against the expected prior status; execution is
//! additionally guarded by a claim so a handler can never run twice for one
//! request.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use helmcrm_approvals::{
    ApprovalAction, ApprovalRequest, ApprovalRequestId, ApprovalStatus, Decision, ExecutionRecord,
};

/// Approval store operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApprovalStoreError {
    #[error("approval request not found: {0}")]
    NotFound(ApprovalRequestId),

    #[error("approval request already exists: {0}")]
    AlreadyExists(ApprovalRequestId),

    /// The conditional update found the row in a different status than
    /// expected — a concurrent decision already applied.
    #[error("status conflict: expected {expected}, found {actual}")]
    Conflict {
        expected: ApprovalStatus,
        actual: ApprovalStatus,
    },

    /// Another caller holds the execution claim for this request.
    #[error("execution already claimed: {0}")]
    AlreadyClaimed(ApprovalRequestId),

    #[error("approval store unavailable: {0}")]
    Unavailable(String),
}

/// Durable store of approval requests.
///
/// ## Atomicity contract
///
/// `decide` is a single compare-and-set: the decision applies only if the
/// row's status still equals `expected`; otherwise `Conflict` reports the
/// actual status. Under two concurrent decisions on the same pending row,
/// exactly one caller succeeds.
///
/// ## At-most-once execution
///
/// Execution is two-phase. `claim_execution` atomically marks an `approved`,
/// unclaimed row as in flight (a SQL backend maps this to
/// `UPDATE ... WHERE status = 'approved' AND claimed_at IS NULL`);
/// `complete_execution` records the terminal outcome. A caller that loses the
/// claim gets `AlreadyClaimed` (execution in flight) or `Conflict` (already
/// terminal) and must not invoke the handler. A timed-out completion is
/// detectable by re-reading the row rather than re-applying the effect.
pub trait ApprovalStore: Send + Sync {
    fn insert(&self, request: ApprovalRequest) -> Result<(), ApprovalStoreError>;

    fn get(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, ApprovalStoreError>;

    fn list_by_status(
        &self,
        status: ApprovalStatus,
        limit: usize,
    ) -> Result<Vec<ApprovalRequest>, ApprovalStoreError>;

    /// Find a pending request targeting the same resource, record and action
    /// kind as `action`.
    fn find_pending_duplicate(
        &self,
        action: &ApprovalAction,
    ) -> Result<Option<ApprovalRequestId>, ApprovalStoreError>;

    /// Atomically apply a decision if the row's status still equals
    /// `expected`.
    fn decide(
        &self,
        id: ApprovalRequestId,
        expected: ApprovalStatus,
        decision: Decision,
    ) -> Result<ApprovalRequest, ApprovalStoreError>;

    /// Atomically claim an `approved`, unclaimed row for execution.
    fn claim_execution(
        &self,
        id: ApprovalRequestId,
    ) -> Result<ApprovalRequest, ApprovalStoreError>;

    /// Record the terminal execution outcome for a claimed row.
    fn complete_execution(
        &self,
        id: ApprovalRequestId,
        record: ExecutionRecord,
    ) -> Result<ApprovalRequest, ApprovalStoreError>;
}

impl<S> ApprovalStore for Arc<S>
where
    S: ApprovalStore + ?Sized,
{
    fn insert(&self, request: ApprovalRequest) -> Result<(), ApprovalStoreError> {
        (**self).insert(request)
    }

    fn get(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, ApprovalStoreError> {
        (**self).get(id)
    }

    fn list_by_status(
        &self,
        status: ApprovalStatus,
        limit: usize,
    ) -> Result<Vec<ApprovalRequest>, ApprovalStoreError> {
        (**self).list_by_status(status, limit)
    }

    fn find_pending_duplicate(
        &self,
        action: &ApprovalAction,
    ) -> Result<Option<ApprovalRequestId>, ApprovalStoreError> {
        (**self).find_pending_duplicate(action)
    }

    fn decide(
        &self,
        id: ApprovalRequestId,
        expected: ApprovalStatus,
        decision: Decision,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        (**self).decide(id, expected, decision)
    }

    fn claim_execution(
        &self,
        id: ApprovalRequestId,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        (**self).claim_execution(id)
    }

    fn complete_execution(
        &self,
        id: ApprovalRequestId,
        record: ExecutionRecord,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        (**self).complete_execution(id, record)
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    request: ApprovalRequest,
    execution_claimed: bool,
}

/// In-memory approval store.
///
/// Intended for tests/dev. All conditional updates happen under one write
/// lock, giving the same atomicity a SQL backend gets from conditional
/// updates.
#[derive(Debug, Default)]
pub struct InMemoryApprovalStore {
    rows: RwLock<HashMap<ApprovalRequestId, StoredRow>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned() -> ApprovalStoreError {
    ApprovalStoreError::Unavailable("lock poisoned".to_string())
}

impl ApprovalStore for InMemoryApprovalStore {
    fn insert(&self, request: ApprovalRequest) -> Result<(), ApprovalStoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows.contains_key(&request.id) {
            return Err(ApprovalStoreError::AlreadyExists(request.id));
        }
        rows.insert(
            request.id,
            StoredRow {
                request,
                execution_claimed: false,
            },
        );
        Ok(())
    }

    fn get(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, ApprovalStoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&id).map(|row| row.request.clone()))
    }

    fn list_by_status(
        &self,
        status: ApprovalStatus,
        limit: usize,
    ) -> Result<Vec<ApprovalRequest>, ApprovalStoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let mut matching: Vec<ApprovalRequest> = rows
            .values()
            .filter(|row| row.request.status == status)
            .map(|row| row.request.clone())
            .collect();
        matching.sort_by_key(|r| r.created_at);
        matching.truncate(limit);
        Ok(matching)
    }

    fn find_pending_duplicate(
        &self,
        action: &ApprovalAction,
    ) -> Result<Option<ApprovalRequestId>, ApprovalStoreError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .find(|row| {
                row.request.status.is_pending()
                    && row.request.action.resource() == action.resource()
                    && row.request.action.record_id() == action.record_id()
                    && row.request.action.kind() == action.kind()
            })
            .map(|row| row.request.id))
    }

    fn decide(
        &self,
        id: ApprovalRequestId,
        expected: ApprovalStatus,
        decision: Decision,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let row = rows.get_mut(&id).ok_or(ApprovalStoreError::NotFound(id))?;

        if row.request.status != expected {
            return Err(ApprovalStoreError::Conflict {
                expected,
                actual: row.request.status,
            });
        }

        row.request.apply_decision(&decision);
        Ok(row.request.clone())
    }

    fn claim_execution(
        &self,
        id: ApprovalRequestId,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let row = rows.get_mut(&id).ok_or(ApprovalStoreError::NotFound(id))?;

        if row.request.status != ApprovalStatus::Approved {
            return Err(ApprovalStoreError::Conflict {
                expected: ApprovalStatus::Approved,
                actual: row.request.status,
            });
        }
        if row.execution_claimed {
            return Err(ApprovalStoreError::AlreadyClaimed(id));
        }

        row.execution_claimed = true;
        Ok(row.request.clone())
    }

    fn complete_execution(
        &self,
        id: ApprovalRequestId,
        record: ExecutionRecord,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let row = rows.get_mut(&id).ok_or(ApprovalStoreError::NotFound(id))?;

        if row.request.status != ApprovalStatus::Approved {
            return Err(ApprovalStoreError::Conflict {
                expected: ApprovalStatus::Approved,
                actual: row.request.status,
            });
        }

        row.request.apply_execution(record);
        Ok(row.request.clone())
    }
}
