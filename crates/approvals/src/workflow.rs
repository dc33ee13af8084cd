use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use helmcrm_authz::ResourceKind;
use helmcrm_core::{AccessError, Role, UserId};

use crate::action::ApprovalAction;

/// Identifier of an approval workflow configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
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

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for WorkflowId {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| AccessError::invalid_argument(format!("WorkflowId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Numeric gate on an action's headline metric.
///
/// Actions whose metric exceeds `limit` require approval; actions without a
/// metric are unaffected by the threshold.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub limit: f64,
}

/// Administrator-configured approval gate for one action kind on one
/// resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub id: WorkflowId,
    pub resource: ResourceKind,
    /// Action-kind tag this workflow gates (`ApprovalAction::kind`).
    pub action_kind: String,
    pub threshold: Option<Threshold>,
    pub approver_roles: Vec<Role>,
    pub approver_user_ids: Vec<UserId>,
    pub is_active: bool,
}

impl ApprovalWorkflow {
    pub fn new(resource: ResourceKind, action_kind: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            resource,
            action_kind: action_kind.into(),
            threshold: None,
            approver_roles: Vec::new(),
            approver_user_ids: Vec::new(),
            is_active: true,
        }
    }

    pub fn with_threshold(mut self, limit: f64) -> Self {
        self.threshold = Some(Threshold { limit });
        self
    }

    pub fn with_approver_roles(mut self, roles: Vec<Role>) -> Self {
        self.approver_roles = roles;
        self
    }

    pub fn with_approver_users(mut self, user_ids: Vec<UserId>) -> Self {
        self.approver_user_ids = user_ids;
        self
    }

    /// Whether this workflow configures the given action at all.
    pub fn applies_to(&self, action: &ApprovalAction) -> bool {
        self.is_active && self.resource == action.resource() && self.action_kind == action.kind()
    }

    /// Whether the action must go through approval under this workflow.
    ///
    /// A workflow without a threshold gates unconditionally. With a threshold,
    /// only actions whose metric exceeds the limit are gated; an action with
    /// no metric passes a thresholded workflow untouched.
    pub fn requires_approval_for(&self, action: &ApprovalAction) -> bool {
        if !self.applies_to(action) {
            return false;
        }
        match (self.threshold, action.threshold_metric()) {
            (Some(threshold), Some(metric)) => metric > threshold.limit,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Whether this workflow names the given user (directly or via role) as
    /// an eligible approver.
    pub fn permits_approver(&self, user_id: UserId, role: Role) -> bool {
        self.approver_roles.contains(&role) || self.approver_user_ids.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ApprovalAction, DocumentKind};
    use helmcrm_core::RecordId;

    fn discount(discount_pct: f64) -> ApprovalAction {
        ApprovalAction::DiscountOverride {
            document: DocumentKind::Quote,
            document_id: RecordId::new(),
            items: vec![],
            discount_pct,
        }
    }

    #[test]
    fn threshold_gates_only_above_the_limit() {
        let workflow =
            ApprovalWorkflow::new(ResourceKind::Quote, "discount_override").with_threshold(20.0);

        assert!(workflow.requires_approval_for(&discount(25.0)));
        assert!(!workflow.requires_approval_for(&discount(20.0)));
        assert!(!workflow.requires_approval_for(&discount(5.0)));
    }

    #[test]
    fn workflow_without_threshold_gates_unconditionally() {
        let workflow = ApprovalWorkflow::new(ResourceKind::Quote, "discount_override");
        assert!(workflow.requires_approval_for(&discount(0.0)));
    }

    #[test]
    fn inactive_workflow_never_applies() {
        let mut workflow = ApprovalWorkflow::new(ResourceKind::Quote, "discount_override");
        workflow.is_active = false;
        assert!(!workflow.requires_approval_for(&discount(99.0)));
    }

    #[test]
    fn mismatched_resource_or_kind_does_not_apply() {
        let workflow = ApprovalWorkflow::new(ResourceKind::Invoice, "discount_override");
        assert!(!workflow.applies_to(&discount(25.0)));

        let workflow = ApprovalWorkflow::new(ResourceKind::Quote, "pricing_override");
        assert!(!workflow.applies_to(&discount(25.0)));
    }

    #[test]
    fn approver_lists_cover_roles_and_users() {
        let named = UserId::new();
        let workflow = ApprovalWorkflow::new(ResourceKind::Quote, "discount_override")
            .with_approver_roles(vec![Role::Finance])
            .with_approver_users(vec![named]);

        assert!(workflow.permits_approver(UserId::new(), Role::Finance));
        assert!(workflow.permits_approver(named, Role::Sales));
        assert!(!workflow.permits_approver(UserId::new(), Role::Sales));
    }
}
