//! Approval workflow configuration storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use helmcrm_approvals::{ApprovalAction, ApprovalWorkflow, WorkflowId};

/// Workflow store operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowStoreError {
    #[error("workflow already exists: {0}")]
    AlreadyExists(WorkflowId),
    #[error("workflow store unavailable: {0}")]
    Unavailable(String),
}

/// Store of administrator-configured approval workflows.
pub trait WorkflowStore: Send + Sync {
    fn insert(&self, workflow: ApprovalWorkflow) -> Result<(), WorkflowStoreError>;

    fn get(&self, id: WorkflowId) -> Result<Option<ApprovalWorkflow>, WorkflowStoreError>;

    /// Active workflows configuring the given action.
    fn active_for(
        &self,
        action: &ApprovalAction,
    ) -> Result<Vec<ApprovalWorkflow>, WorkflowStoreError>;
}

impl<S> WorkflowStore for Arc<S>
where
    S: WorkflowStore + ?Sized,
{
    fn insert(&self, workflow: ApprovalWorkflow) -> Result<(), WorkflowStoreError> {
        (**self).insert(workflow)
    }

    fn get(&self, id: WorkflowId) -> Result<Option<ApprovalWorkflow>, WorkflowStoreError> {
        (**self).get(id)
    }

    fn active_for(
        &self,
        action: &ApprovalAction,
    ) -> Result<Vec<ApprovalWorkflow>, WorkflowStoreError> {
        (**self).active_for(action)
    }
}

/// In-memory workflow store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<WorkflowId, ApprovalWorkflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn insert(&self, workflow: ApprovalWorkflow) -> Result<(), WorkflowStoreError> {
        let mut workflows = self
            .workflows
            .write()
            .map_err(|_| WorkflowStoreError::Unavailable("lock poisoned".to_string()))?;
        if workflows.contains_key(&workflow.id) {
            return Err(WorkflowStoreError::AlreadyExists(workflow.id));
        }
        workflows.insert(workflow.id, workflow);
        Ok(())
    }

    fn get(&self, id: WorkflowId) -> Result<Option<ApprovalWorkflow>, WorkflowStoreError> {
        let workflows = self
            .workflows
            .read()
            .map_err(|_| WorkflowStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(workflows.get(&id).cloned())
    }

    fn active_for(
        &self,
        action: &ApprovalAction,
    ) -> Result<Vec<ApprovalWorkflow>, WorkflowStoreError> {
        let workflows = self
            .workflows
            .read()
            .map_err(|_| WorkflowStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(workflows
            .values()
            .filter(|w| w.applies_to(action))
            .cloned()
            .collect())
    }
}
