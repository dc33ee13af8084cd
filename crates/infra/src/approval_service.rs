//! Approval request lifecycle service.
//!
//! Drives `pending → approved/rejected → executed/execution_failed` over the
//! approval store's compare-and-set contract, authorizes approvers through the
//! permission resolver, executes approved actions through the registry, and
//! audits every transition.

use chrono::Utc;
use serde_json::{Value as JsonValue, json};

use helmcrm_approvals::{
    ApprovalAction, ApprovalRequest, ApprovalRequestId, ApprovalStatus, Decision, ExecutionOutcome,
    ExecutionRecord, WorkflowId,
};
use helmcrm_audit::{AuditEntry, AuditWriter, RequestMeta};
use helmcrm_authz::{PermissionAction, Scope};
use helmcrm_core::{AccessError, AccessResult, Actor};

use crate::approval_store::{ApprovalStore, ApprovalStoreError};
use crate::binding_store::BindingStore;
use crate::executor::ExecutorRegistry;
use crate::permission_service::PermissionService;
use crate::workflow_store::{WorkflowStore, WorkflowStoreError};

/// Result of one execution attempt, as reported to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub request_id: ApprovalRequestId,
    pub status: ApprovalStatus,
    pub success: bool,
    pub data: Option<JsonValue>,
    pub error: Option<String>,
}

impl ExecutionReport {
    fn from_request(request: &ApprovalRequest) -> AccessResult<Self> {
        let Some(execution) = &request.execution else {
            return Err(AccessError::conflict(format!(
                "request {} has no recorded execution",
                request.id
            )));
        };
        Ok(match &execution.outcome {
            ExecutionOutcome::Succeeded { data } => Self {
                request_id: request.id,
                status: request.status,
                success: true,
                data: Some(data.clone()),
                error: None,
            },
            ExecutionOutcome::Failed { error } => Self {
                request_id: request.id,
                status: request.status,
                success: false,
                data: None,
                error: Some(error.clone()),
            },
        })
    }
}

/// Combined approve-then-execute outcome.
///
/// Approval and execution are two independently retriable operations; this
/// surfaces their combination so a caller can report partial success
/// (approved, but the action failed) distinctly from success and from
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub request_id: ApprovalRequestId,
    pub status: ApprovalStatus,
    pub execution: ExecutionReport,
}

impl ApprovalOutcome {
    /// Approval was recorded but the action did not execute.
    pub fn is_partial_success(&self) -> bool {
        matches!(self.status, ApprovalStatus::ExecutionFailed)
    }
}

/// Approval request lifecycle service.
pub struct ApprovalService<S, W, B> {
    store: S,
    workflows: W,
    permissions: PermissionService<B>,
    registry: ExecutorRegistry,
    audit: AuditWriter,
}

impl<S, W, B> ApprovalService<S, W, B>
where
    S: ApprovalStore,
    W: WorkflowStore,
    B: BindingStore,
{
    pub fn new(
        store: S,
        workflows: W,
        permissions: PermissionService<B>,
        registry: ExecutorRegistry,
        audit: AuditWriter,
    ) -> Self {
        Self {
            store,
            workflows,
            permissions,
            registry,
            audit,
        }
    }

    pub fn permissions(&self) -> &PermissionService<B> {
        &self.permissions
    }

    /// Whether `action` must go through approval, per the configured
    /// workflows. Returns the gating workflow's id when it must.
    pub fn approval_required(&self, action: &ApprovalAction) -> AccessResult<Option<WorkflowId>> {
        let workflows = self.workflows.active_for(action).map_err(workflow_err)?;
        Ok(workflows
            .iter()
            .find(|w| w.requires_approval_for(action))
            .map(|w| w.id))
    }

    /// Create a pending request. The requester only needs to be
    /// authenticated — the action-specific risk is gated at approval time.
    pub fn create(
        &self,
        requester: &Actor,
        action: ApprovalAction,
        meta: &RequestMeta,
    ) -> AccessResult<ApprovalRequest> {
        let requester_id = requester.require_user()?;

        if let Some(existing) = self
            .store
            .find_pending_duplicate(&action)
            .map_err(store_err)?
        {
            return Err(AccessError::conflict(format!(
                "an approval request for this action is already pending ({existing})"
            )));
        }

        let workflow_id = self
            .workflows
            .active_for(&action)
            .map_err(workflow_err)?
            .first()
            .map(|w| w.id);

        let request = ApprovalRequest::new(requester_id, action, workflow_id);
        self.store.insert(request.clone()).map_err(store_err)?;

        self.audit.record(
            AuditEntry::new("approval_requested", request.action.resource().as_str())
                .by(Some(requester_id))
                .on(request.action.record_id())
                .with_details(json!({
                    "approval_request_id": request.id,
                    "action": request.action.kind(),
                }))
                .with_meta(meta),
        );

        Ok(request)
    }

    /// Whether the actor may approve the request.
    ///
    /// False — not an error — for any request that is missing or no longer
    /// pending. Self-approval is always false, regardless of role or
    /// workflow configuration.
    pub fn can_approve(
        &self,
        actor: &Actor,
        request_id: ApprovalRequestId,
    ) -> AccessResult<bool> {
        let Some(request) = self.store.get(request_id).map_err(store_err)? else {
            return Ok(false);
        };
        if !request.status.is_pending() {
            return Ok(false);
        }
        let Some(user_id) = actor.user_id else {
            return Ok(false);
        };
        if user_id == request.requester_id {
            return Ok(false);
        }
        self.is_authorized_approver(actor, &request)
    }

    /// Atomically transition `pending → approved`.
    ///
    /// Exactly one of several concurrent decisions on the same request
    /// succeeds; the rest observe `Conflict`.
    pub fn approve(
        &self,
        actor: &Actor,
        request_id: ApprovalRequestId,
        meta: &RequestMeta,
    ) -> AccessResult<ApprovalRequest> {
        let approver = actor.require_user()?;
        let request = self
            .store
            .get(request_id)
            .map_err(store_err)?
            .ok_or(AccessError::NotFound)?;

        self.authorize_decision(actor, approver, &request)?;

        let decision = Decision::Approve {
            approver,
            decided_at: Utc::now(),
        };
        let updated = self
            .store
            .decide(request_id, ApprovalStatus::Pending, decision)
            .map_err(store_err)?;

        self.audit.record(
            AuditEntry::new("approval_approved", "approval_request")
                .by(Some(approver))
                .with_details(json!({
                    "approval_request_id": updated.id,
                    "action": updated.action.kind(),
                }))
                .with_meta(meta),
        );

        Ok(updated)
    }

    /// Atomically transition `pending → rejected`. Reason is mandatory.
    pub fn reject(
        &self,
        actor: &Actor,
        request_id: ApprovalRequestId,
        reason: &str,
        meta: &RequestMeta,
    ) -> AccessResult<ApprovalRequest> {
        if reason.trim().is_empty() {
            return Err(AccessError::invalid_argument("rejection reason is required"));
        }

        let approver = actor.require_user()?;
        let request = self
            .store
            .get(request_id)
            .map_err(store_err)?
            .ok_or(AccessError::NotFound)?;

        self.authorize_decision(actor, approver, &request)?;

        let decision = Decision::Reject {
            approver,
            reason: reason.to_string(),
            decided_at: Utc::now(),
        };
        let updated = self
            .store
            .decide(request_id, ApprovalStatus::Pending, decision)
            .map_err(store_err)?;

        self.audit.record(
            AuditEntry::new("approval_rejected", "approval_request")
                .by(Some(approver))
                .with_details(json!({
                    "approval_request_id": updated.id,
                    "action": updated.action.kind(),
                    "reason": reason,
                }))
                .with_meta(meta),
        );

        Ok(updated)
    }

    /// Execute an approved request's action, at most once.
    ///
    /// The handler is invoked only by the caller holding the execution claim.
    /// A concurrent caller that loses the claim observes either the stored
    /// outcome of the first execution (once terminal) or `Conflict` while it
    /// is still in flight. Handler failure is recorded as the terminal
    /// `execution_failed` state and reported — never thrown — because the
    /// approval itself has already succeeded and must not be undone.
    pub fn execute(
        &self,
        request_id: ApprovalRequestId,
        meta: &RequestMeta,
    ) -> AccessResult<ExecutionReport> {
        let request = match self.store.claim_execution(request_id) {
            Ok(request) => request,
            Err(ApprovalStoreError::Conflict { actual, .. }) if actual.is_terminal() => {
                // A previous execution already finished; report its outcome
                // instead of re-running the handler.
                let stored = self
                    .store
                    .get(request_id)
                    .map_err(store_err)?
                    .ok_or(AccessError::NotFound)?;
                if stored.execution.is_some() {
                    return ExecutionReport::from_request(&stored);
                }
                return Err(AccessError::conflict(format!(
                    "request {request_id} is {actual}"
                )));
            }
            Err(e) => return Err(store_err(e)),
        };

        let outcome = match self.registry.execute(&request.action) {
            Ok(data) => ExecutionOutcome::Succeeded { data },
            Err(e) => ExecutionOutcome::Failed {
                error: e.to_string(),
            },
        };

        let record = ExecutionRecord {
            finished_at: Utc::now(),
            outcome,
        };
        let updated = self
            .store
            .complete_execution(request_id, record)
            .map_err(store_err)?;

        let report = ExecutionReport::from_request(&updated)?;
        let audit_action = if report.success {
            "approval_executed"
        } else {
            "approval_execution_failed"
        };
        self.audit.record(
            AuditEntry::new(audit_action, "approval_request")
                .by(updated.approver_id)
                .with_details(json!({
                    "approval_request_id": updated.id,
                    "action": updated.action.kind(),
                    "execution_success": report.success,
                    "execution_error": report.error,
                }))
                .with_meta(meta),
        );

        Ok(report)
    }

    /// Approve, then immediately execute.
    ///
    /// The two steps stay independently atomic: a recorded approval is never
    /// rolled back by an execution problem. The outcome distinguishes full
    /// success from partial success (approved, execution failed).
    pub fn approve_and_execute(
        &self,
        actor: &Actor,
        request_id: ApprovalRequestId,
        meta: &RequestMeta,
    ) -> AccessResult<ApprovalOutcome> {
        self.approve(actor, request_id, meta)?;
        let execution = self.execute(request_id, meta)?;
        Ok(ApprovalOutcome {
            request_id,
            status: execution.status,
            execution,
        })
    }

    /// Pending requests the actor is eligible to approve.
    pub fn pending_for(&self, actor: &Actor) -> AccessResult<Vec<ApprovalRequest>> {
        let Some(user_id) = actor.user_id else {
            return Ok(Vec::new());
        };

        let pending = self
            .store
            .list_by_status(ApprovalStatus::Pending, usize::MAX)
            .map_err(store_err)?;

        let mut eligible = Vec::new();
        for request in pending {
            if request.requester_id == user_id {
                continue;
            }
            if self.is_authorized_approver(actor, &request)? {
                eligible.push(request);
            }
        }
        Ok(eligible)
    }

    /// Shared gate for approve/reject: pending-only, no self-approval, and
    /// either a resolver grant or a workflow approver listing.
    fn authorize_decision(
        &self,
        actor: &Actor,
        approver: helmcrm_core::UserId,
        request: &ApprovalRequest,
    ) -> AccessResult<()> {
        if approver == request.requester_id {
            return Err(AccessError::forbidden("self-approval is not permitted"));
        }
        if !self.is_authorized_approver(actor, request)? {
            self.audit.record(
                AuditEntry::new("permission_denied", request.action.resource().as_str())
                    .by(Some(approver))
                    .with_details(json!({
                        "action": "approve",
                        "approval_request_id": request.id,
                    })),
            );
            return Err(AccessError::forbidden(format!(
                "approve on {}",
                request.action.resource()
            )));
        }
        Ok(())
    }

    fn is_authorized_approver(
        &self,
        actor: &Actor,
        request: &ApprovalRequest,
    ) -> AccessResult<bool> {
        if let Some(workflow_id) = request.workflow_id {
            if let Some(workflow) = self.workflows.get(workflow_id).map_err(workflow_err)? {
                let Some(user_id) = actor.user_id else {
                    return Ok(false);
                };
                if workflow.permits_approver(user_id, actor.role) {
                    return Ok(true);
                }
            }
        }

        self.permissions.has_permission(
            actor,
            request.action.resource(),
            PermissionAction::Approve,
            Scope::All,
        )
    }
}

impl<S, W, B> core::fmt::Debug for ApprovalService<S, W, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApprovalService").finish_non_exhaustive()
    }
}

fn store_err(e: ApprovalStoreError) -> AccessError {
    match e {
        ApprovalStoreError::NotFound(_) => AccessError::NotFound,
        ApprovalStoreError::AlreadyExists(id) => {
            AccessError::conflict(format!("request {id} already exists"))
        }
        ApprovalStoreError::Conflict { expected, actual } => AccessError::conflict(format!(
            "expected status {expected}, found {actual}"
        )),
        ApprovalStoreError::AlreadyClaimed(id) => {
            AccessError::conflict(format!("execution of {id} is already in progress"))
        }
        ApprovalStoreError::Unavailable(msg) => AccessError::store_unavailable(msg),
    }
}

fn workflow_err(e: WorkflowStoreError) -> AccessError {
    match e {
        WorkflowStoreError::AlreadyExists(id) => {
            AccessError::conflict(format!("workflow {id} already exists"))
        }
        WorkflowStoreError::Unavailable(msg) => AccessError::store_unavailable(msg),
    }
}
