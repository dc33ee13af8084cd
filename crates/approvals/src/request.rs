use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use helmcrm_core::{AccessError, UserId};

use crate::action::ApprovalAction;
use crate::workflow::WorkflowId;

/// Identifier of an approval request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalRequestId(Uuid);

impl ApprovalRequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ApprovalRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ApprovalRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ApprovalRequestId {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| AccessError::invalid_argument(format!("ApprovalRequestId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Approval request lifecycle status.
///
/// Transitions are monotonic:
/// `pending → approved → executed | execution_failed` and
/// `pending → rejected`. `rejected`, `executed` and `execution_failed` are
/// terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    ExecutionFailed,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApprovalStatus::Rejected | ApprovalStatus::Executed | ApprovalStatus::ExecutionFailed
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ApprovalStatus::Pending)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (ApprovalStatus::Pending, ApprovalStatus::Approved)
                | (ApprovalStatus::Pending, ApprovalStatus::Rejected)
                | (ApprovalStatus::Approved, ApprovalStatus::Executed)
                | (ApprovalStatus::Approved, ApprovalStatus::ExecutionFailed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Executed => "executed",
            ApprovalStatus::ExecutionFailed => "execution_failed",
        }
    }
}

impl core::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An approver's verdict on a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve {
        approver: UserId,
        decided_at: DateTime<Utc>,
    },
    Reject {
        approver: UserId,
        reason: String,
        decided_at: DateTime<Utc>,
    },
}

impl Decision {
    pub fn resulting_status(&self) -> ApprovalStatus {
        match self {
            Decision::Approve { .. } => ApprovalStatus::Approved,
            Decision::Reject { .. } => ApprovalStatus::Rejected,
        }
    }
}

/// Outcome of the single execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ExecutionOutcome {
    Succeeded { data: JsonValue },
    Failed { error: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Succeeded { .. })
    }

    pub fn resulting_status(&self) -> ApprovalStatus {
        match self {
            ExecutionOutcome::Succeeded { .. } => ApprovalStatus::Executed,
            ExecutionOutcome::Failed { .. } => ApprovalStatus::ExecutionFailed,
        }
    }
}

/// Record of the terminal execution attempt. Exactly one is stored per
/// request once the status leaves `approved`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
}

/// A pending privileged change.
///
/// The payload (`action`) is immutable after creation. Ownership passes from
/// the requester to the approver once decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub requester_id: UserId,
    pub action: ApprovalAction,
    pub status: ApprovalStatus,
    pub approver_id: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub execution: Option<ExecutionRecord>,
    pub workflow_id: Option<WorkflowId>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        requester_id: UserId,
        action: ApprovalAction,
        workflow_id: Option<WorkflowId>,
    ) -> Self {
        Self {
            id: ApprovalRequestId::new(),
            requester_id,
            action,
            status: ApprovalStatus::Pending,
            approver_id: None,
            decided_at: None,
            rejection_reason: None,
            execution: None,
            workflow_id,
            created_at: Utc::now(),
        }
    }

    /// Apply a decision. The caller (the store's compare-and-set) has already
    /// verified the request is still pending.
    pub fn apply_decision(&mut self, decision: &Decision) {
        debug_assert!(self.status.is_pending());
        match decision {
            Decision::Approve {
                approver,
                decided_at,
            } => {
                self.status = ApprovalStatus::Approved;
                self.approver_id = Some(*approver);
                self.decided_at = Some(*decided_at);
            }
            Decision::Reject {
                approver,
                reason,
                decided_at,
            } => {
                self.status = ApprovalStatus::Rejected;
                self.approver_id = Some(*approver);
                self.decided_at = Some(*decided_at);
                self.rejection_reason = Some(reason.clone());
            }
        }
    }

    /// Record the execution outcome. The caller has already verified the
    /// request is approved and has claimed the execution.
    pub fn apply_execution(&mut self, record: ExecutionRecord) {
        debug_assert_eq!(self.status, ApprovalStatus::Approved);
        self.status = record.outcome.resulting_status();
        self.execution = Some(record);
    }
}
