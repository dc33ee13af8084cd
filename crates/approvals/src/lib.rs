//! `helmcrm-approvals` — approval request domain model.
//!
//! A privileged change is requested, approved or rejected by a second party,
//! and executed exactly once. This crate holds the pure model: the request
//! state machine, the typed action payloads, workflow configuration, and the
//! pricing policy that decides when an approval is needed. No IO.

pub mod action;
pub mod pricing;
pub mod request;
pub mod workflow;

pub use action::{ApprovalAction, DocumentKind, PricedItem};
pub use request::{
    ApprovalRequest, ApprovalRequestId, ApprovalStatus, Decision, ExecutionOutcome, ExecutionRecord,
};
pub use workflow::{ApprovalWorkflow, Threshold, WorkflowId};
