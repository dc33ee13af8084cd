//! `helmcrm-infra` — stores and services for the authorization/approval core.
//!
//! Store traits are synchronous `Send + Sync` contracts with in-memory
//! implementations for tests/dev; SQL backends can be added behind the same
//! traits. Services compose the pure domain crates with the stores:
//! [`PermissionService`] resolves decisions freshly per request,
//! [`ApprovalService`] drives the request state machine and the executor
//! registry.

pub mod approval_service;
pub mod approval_store;
pub mod audit_store;
pub mod binding_store;
pub mod executor;
pub mod permission_service;
pub mod seed;
pub mod workflow_store;

mod integration_tests;

pub use approval_service::{ApprovalOutcome, ApprovalService, ExecutionReport};
pub use approval_store::{ApprovalStore, ApprovalStoreError, InMemoryApprovalStore};
pub use audit_store::{AuditFilter, FailingAuditSink, InMemoryAuditLog};
pub use binding_store::{BindingStore, BindingStoreError, InMemoryBindingStore};
pub use executor::{ActionHandler, ExecutionError, ExecutorRegistry};
pub use permission_service::PermissionService;
pub use workflow_store::{InMemoryWorkflowStore, WorkflowStore, WorkflowStoreError};
