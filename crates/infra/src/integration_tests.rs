//! Integration tests for the authorization + approval pipeline.
//!
//! Tests: resolver → approval state machine → executor registry → audit log.
//!
//! Verifies:
//! - Approver authorization (resolver grants, workflow lists, self-approval)
//! - Exactly-one-winner semantics for concurrent decisions
//! - At-most-once handler invocation under concurrent execution
//! - Partial-success reporting when execution fails after approval
//! - Best-effort audit writes and fail-closed permission checks

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use serde_json::json;

    use helmcrm_approvals::{
        ApprovalAction, ApprovalRequest, ApprovalStatus, ApprovalWorkflow, DocumentKind, PricedItem,
    };
    use helmcrm_audit::{AuditWriter, RequestMeta};
    use helmcrm_authz::{Permission, PermissionAction, ResourceKind, Scope};
    use helmcrm_core::{AccessError, Actor, RecordId, Role, UserId};

    use crate::approval_service::ApprovalService;
    use crate::approval_store::InMemoryApprovalStore;
    use crate::audit_store::{AuditFilter, FailingAuditSink, InMemoryAuditLog};
    use crate::binding_store::{BindingStore, BindingStoreError, InMemoryBindingStore};
    use crate::executor::ExecutorRegistry;
    use crate::permission_service::PermissionService;
    use crate::seed;
    use crate::workflow_store::{InMemoryWorkflowStore, WorkflowStore};

    type Service = ApprovalService<
        Arc<InMemoryApprovalStore>,
        Arc<InMemoryWorkflowStore>,
        Arc<InMemoryBindingStore>,
    >;

    struct Harness {
        service: Service,
        workflows: Arc<InMemoryWorkflowStore>,
        audit_log: Arc<InMemoryAuditLog>,
        handler_calls: Arc<AtomicUsize>,
    }

    /// Service over seeded in-memory stores. `fail_execution` makes the
    /// reassign_lead handler report failure.
    fn setup(fail_execution: bool) -> Harness {
        let bindings = InMemoryBindingStore::arc();
        seed::default_catalog(&bindings).unwrap();

        let approvals = InMemoryApprovalStore::arc();
        let workflows = InMemoryWorkflowStore::arc();
        let audit_log = InMemoryAuditLog::arc();
        let audit = AuditWriter::new(audit_log.clone());

        let handler_calls = Arc::new(AtomicUsize::new(0));
        let calls = handler_calls.clone();

        let mut registry = ExecutorRegistry::new();
        registry.register("reassign_lead", move |action| {
            calls.fetch_add(1, Ordering::SeqCst);
            // Hold the claim briefly so racing callers overlap.
            thread::sleep(Duration::from_millis(20));
            if fail_execution {
                anyhow::bail!("lead not found in downstream system");
            }
            let ApprovalAction::ReassignLead { new_owner_id, .. } = action else {
                anyhow::bail!("unexpected payload");
            };
            Ok(json!({"reassigned_to": new_owner_id}))
        });
        registry.register("discount_override", |_| Ok(json!({"applied": true})));

        let permissions = PermissionService::new(bindings.clone(), AuditWriter::new(audit_log.clone()));
        let service = ApprovalService::new(
            approvals,
            workflows.clone(),
            permissions,
            registry,
            audit,
        );

        Harness {
            service,
            workflows,
            audit_log,
            handler_calls,
        }
    }

    fn reassign_action() -> ApprovalAction {
        ApprovalAction::ReassignLead {
            lead_id: RecordId::new(),
            new_owner_id: UserId::new(),
        }
    }

    fn sales() -> Actor {
        Actor::new(UserId::new(), Role::Sales)
    }

    fn admin() -> Actor {
        Actor::new(UserId::new(), Role::Admin)
    }

    fn create_pending(harness: &Harness, requester: &Actor) -> ApprovalRequest {
        harness
            .service
            .create(requester, reassign_action(), &RequestMeta::empty())
            .unwrap()
    }

    #[test]
    fn admin_may_approve_sales_may_not() {
        let harness = setup(false);
        let requester = sales();
        let request = create_pending(&harness, &requester);

        assert!(harness.service.can_approve(&admin(), request.id).unwrap());
        assert!(!harness.service.can_approve(&sales(), request.id).unwrap());
    }

    #[test]
    fn self_approval_is_always_rejected() {
        let harness = setup(false);
        // Even an admin cannot approve their own request.
        let requester = admin();
        let request = create_pending(&harness, &requester);

        assert!(!harness.service.can_approve(&requester, request.id).unwrap());
        let err = harness
            .service
            .approve(&requester, request.id, &RequestMeta::empty())
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));
    }

    #[test]
    fn can_approve_is_false_for_missing_or_decided_requests() {
        let harness = setup(false);
        let approver = admin();

        let missing = helmcrm_approvals::ApprovalRequestId::new();
        assert!(!harness.service.can_approve(&approver, missing).unwrap());

        let request = create_pending(&harness, &sales());
        harness
            .service
            .approve(&approver, request.id, &RequestMeta::empty())
            .unwrap();
        assert!(!harness.service.can_approve(&admin(), request.id).unwrap());
    }

    #[test]
    fn approve_then_execute_succeeds_end_to_end() {
        let harness = setup(false);
        let request = create_pending(&harness, &sales());
        let approver = admin();

        let approved = harness
            .service
            .approve(&approver, request.id, &RequestMeta::new("198.51.100.7", "tests"))
            .unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);
        assert_eq!(approved.approver_id, approver.user_id);
        assert!(approved.decided_at.is_some());

        let report = harness
            .service
            .execute(request.id, &RequestMeta::empty())
            .unwrap();
        assert!(report.success);
        assert_eq!(report.status, ApprovalStatus::Executed);
        assert!(report.data.unwrap()["reassigned_to"].is_string());
        assert_eq!(harness.handler_calls.load(Ordering::SeqCst), 1);

        // One audit entry per step.
        for action in ["approval_requested", "approval_approved", "approval_executed"] {
            let hits = harness.audit_log.query(&AuditFilter {
                action: Some(action.to_string()),
                ..Default::default()
            });
            assert_eq!(hits.len(), 1, "expected one {action} entry");
        }
    }

    #[test]
    fn failed_execution_reports_partial_success() {
        let harness = setup(true);
        let request = create_pending(&harness, &sales());

        let outcome = harness
            .service
            .approve_and_execute(&admin(), request.id, &RequestMeta::empty())
            .unwrap();

        assert!(outcome.is_partial_success());
        assert_eq!(outcome.status, ApprovalStatus::ExecutionFailed);
        assert!(!outcome.execution.success);
        assert_eq!(
            outcome.execution.error.as_deref(),
            Some("lead not found in downstream system")
        );

        // The approval itself stands; the failure is terminal.
        let stored = harness.service.can_approve(&admin(), request.id).unwrap();
        assert!(!stored);
        let second = harness
            .service
            .execute(request.id, &RequestMeta::empty())
            .unwrap();
        assert!(!second.success);
        assert_eq!(harness.handler_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejection_requires_a_reason_and_stores_it() {
        let harness = setup(false);
        let request = create_pending(&harness, &sales());
        let approver = admin();

        let err = harness
            .service
            .reject(&approver, request.id, "   ", &RequestMeta::empty())
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidArgument(_)));

        let rejected = harness
            .service
            .reject(&approver, request.id, "discount beyond policy", &RequestMeta::empty())
            .unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rejected);
        assert_eq!(
            rejected.rejection_reason.as_deref(),
            Some("discount beyond policy")
        );
    }

    #[test]
    fn concurrent_approve_and_reject_have_exactly_one_winner() {
        let harness = setup(false);
        let service = Arc::new(harness.service);
        let request = service
            .create(&sales(), reassign_action(), &RequestMeta::empty())
            .unwrap();

        let approver_a = admin();
        let approver_b = admin();
        let barrier = Arc::new(Barrier::new(2));

        let approve_handle = {
            let service = service.clone();
            let barrier = barrier.clone();
            let id = request.id;
            thread::spawn(move || {
                barrier.wait();
                service.approve(&approver_a, id, &RequestMeta::empty())
            })
        };
        let reject_handle = {
            let service = service.clone();
            let barrier = barrier.clone();
            let id = request.id;
            thread::spawn(move || {
                barrier.wait();
                service.reject(&approver_b, id, "raced", &RequestMeta::empty())
            })
        };

        let approve_result = approve_handle.join().unwrap();
        let reject_result = reject_handle.join().unwrap();

        let winners = [approve_result.is_ok(), reject_result.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();
        assert_eq!(winners, 1, "exactly one decision must commit");

        let loser = if approve_result.is_ok() {
            reject_result.unwrap_err()
        } else {
            approve_result.unwrap_err()
        };
        assert!(matches!(loser, AccessError::Conflict(_)));

        // The request has definitively left pending.
        assert!(!service.can_approve(&admin(), request.id).unwrap());
    }

    #[test]
    fn concurrent_execution_invokes_the_handler_exactly_once() {
        let harness = setup(false);
        let service = Arc::new(harness.service);
        let request = service
            .create(&sales(), reassign_action(), &RequestMeta::empty())
            .unwrap();
        service
            .approve(&admin(), request.id, &RequestMeta::empty())
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let spawn_execute = |service: Arc<Service>, barrier: Arc<Barrier>| {
            let id = request.id;
            thread::spawn(move || {
                barrier.wait();
                service.execute(id, &RequestMeta::empty())
            })
        };

        let first = spawn_execute(service.clone(), barrier.clone());
        let second = spawn_execute(service.clone(), barrier.clone());
        let results = [first.join().unwrap(), second.join().unwrap()];

        assert_eq!(harness.handler_calls.load(Ordering::SeqCst), 1);

        // The winner reports the execution; the loser either observed the
        // stored outcome or conflicted with the in-flight claim.
        assert!(results.iter().any(|r| matches!(r, Ok(report) if report.success)));
        for result in &results {
            match result {
                Ok(report) => {
                    assert!(report.success);
                    assert_eq!(report.status, ApprovalStatus::Executed);
                }
                Err(e) => assert!(matches!(e, AccessError::Conflict(_))),
            }
        }
    }

    #[test]
    fn second_execution_observes_the_stored_outcome() {
        let harness = setup(false);
        let request = create_pending(&harness, &sales());
        harness
            .service
            .approve(&admin(), request.id, &RequestMeta::empty())
            .unwrap();

        let first = harness
            .service
            .execute(request.id, &RequestMeta::empty())
            .unwrap();
        let second = harness
            .service
            .execute(request.id, &RequestMeta::empty())
            .unwrap();

        assert_eq!(harness.handler_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.data, second.data);
        assert_eq!(second.status, ApprovalStatus::Executed);
    }

    #[test]
    fn executing_an_undecided_request_conflicts() {
        let harness = setup(false);
        let request = create_pending(&harness, &sales());

        let err = harness
            .service
            .execute(request.id, &RequestMeta::empty())
            .unwrap_err();
        assert!(matches!(err, AccessError::Conflict(_)));
        assert_eq!(harness.handler_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn audit_failures_never_change_the_primary_result() {
        let bindings = InMemoryBindingStore::arc();
        seed::default_catalog(&bindings).unwrap();
        let permissions =
            PermissionService::new(bindings, AuditWriter::new(Arc::new(FailingAuditSink)));

        let mut registry = ExecutorRegistry::new();
        registry.register("reassign_lead", |_| Ok(json!({})));

        let service = ApprovalService::new(
            InMemoryApprovalStore::arc(),
            InMemoryWorkflowStore::arc(),
            permissions,
            registry,
            AuditWriter::new(Arc::new(FailingAuditSink)),
        );

        let request = service
            .create(&sales(), reassign_action(), &RequestMeta::empty())
            .unwrap();
        let approved = service
            .approve(&admin(), request.id, &RequestMeta::empty())
            .unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);

        let report = service.execute(request.id, &RequestMeta::empty()).unwrap();
        assert!(report.success);
    }

    #[test]
    fn unavailable_binding_store_fails_closed() {
        struct UnavailableBindingStore;

        impl BindingStore for UnavailableBindingStore {
            fn load_for_actor(
                &self,
                _actor: &Actor,
                _resource: ResourceKind,
            ) -> Result<helmcrm_authz::BindingSet, BindingStoreError> {
                Err(BindingStoreError::Unavailable("connection refused".to_string()))
            }

            fn grant(
                &self,
                _grant: helmcrm_authz::PermissionGrant,
            ) -> Result<(), BindingStoreError> {
                Err(BindingStoreError::Unavailable("connection refused".to_string()))
            }

            fn revoke(
                &self,
                _subject: &helmcrm_authz::GrantSubject,
                _key: &helmcrm_authz::PermissionKey,
            ) -> Result<(), BindingStoreError> {
                Err(BindingStoreError::Unavailable("connection refused".to_string()))
            }
        }

        let permissions =
            PermissionService::new(UnavailableBindingStore, AuditWriter::disabled());
        let rep = sales();

        let err = permissions
            .has_permission(&rep, ResourceKind::Lead, PermissionAction::View, Scope::Own)
            .unwrap_err();
        assert!(matches!(err, AccessError::StoreUnavailable(_)));

        let err = permissions
            .require(&rep, ResourceKind::Lead, PermissionAction::View, Scope::Own)
            .unwrap_err();
        assert!(matches!(err, AccessError::StoreUnavailable(_)));
    }

    #[test]
    fn duplicate_pending_requests_conflict() {
        let harness = setup(false);
        let requester = sales();
        let action = reassign_action();

        harness
            .service
            .create(&requester, action.clone(), &RequestMeta::empty())
            .unwrap();
        let err = harness
            .service
            .create(&requester, action, &RequestMeta::empty())
            .unwrap_err();
        assert!(matches!(err, AccessError::Conflict(_)));
    }

    #[test]
    fn thresholded_workflow_gates_only_large_discounts() {
        let harness = setup(false);
        harness
            .workflows
            .insert(
                ApprovalWorkflow::new(ResourceKind::Quote, "discount_override")
                    .with_threshold(20.0)
                    .with_approver_roles(vec![Role::Finance]),
            )
            .unwrap();

        let discount = |pct: f64| ApprovalAction::DiscountOverride {
            document: DocumentKind::Quote,
            document_id: RecordId::new(),
            items: vec![PricedItem {
                product_id: RecordId::new(),
                quantity: 2,
                unit_price: 5000,
                discount_pct: pct,
            }],
            discount_pct: pct,
        };

        assert!(harness.service.approval_required(&discount(35.0)).unwrap().is_some());
        assert!(harness.service.approval_required(&discount(10.0)).unwrap().is_none());
    }

    #[test]
    fn workflow_approver_roles_open_an_approval_path() {
        let harness = setup(false);
        harness
            .workflows
            .insert(
                ApprovalWorkflow::new(ResourceKind::Quote, "discount_override")
                    .with_approver_roles(vec![Role::Sales]),
            )
            .unwrap();

        let action = ApprovalAction::DiscountOverride {
            document: DocumentKind::Quote,
            document_id: RecordId::new(),
            items: vec![],
            discount_pct: 30.0,
        };
        let request = harness
            .service
            .create(&sales(), action, &RequestMeta::empty())
            .unwrap();

        // Sales has no `approve` grant on quotes, but the workflow lists the
        // role as an approver.
        let peer = sales();
        assert!(harness.service.can_approve(&peer, request.id).unwrap());
        let approved = harness
            .service
            .approve(&peer, request.id, &RequestMeta::empty())
            .unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);
    }

    #[test]
    fn pending_listing_excludes_own_and_unauthorized_requests() {
        let harness = setup(false);
        let requester = sales();
        create_pending(&harness, &requester);
        create_pending(&harness, &sales());

        let reviewer = admin();
        let pending = harness.service.pending_for(&reviewer).unwrap();
        assert_eq!(pending.len(), 2);

        // The requester sees neither their own request nor ones they cannot
        // approve.
        let mine = harness.service.pending_for(&requester).unwrap();
        assert!(mine.is_empty());
    }

    #[test]
    fn permission_denies_are_audited() {
        let harness = setup(false);
        let rep = sales();

        let err = harness
            .service
            .permissions()
            .require(&rep, ResourceKind::Lead, PermissionAction::Delete, Scope::Own)
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));

        let denies = harness.audit_log.query(&AuditFilter {
            action: Some("permission_denied".to_string()),
            ..Default::default()
        });
        assert_eq!(denies.len(), 1);
        assert_eq!(denies[0].resource, "lead");
    }

    #[test]
    fn binding_mutations_are_admin_gated_and_audited() {
        let harness = setup(false);
        let permissions = harness.service.permissions();
        let grant = helmcrm_authz::PermissionGrant::for_user(
            UserId::new(),
            Permission::new(ResourceKind::Lead, PermissionAction::Delete, Scope::All),
        );

        let err = permissions
            .grant(&sales(), grant.clone(), &RequestMeta::empty())
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(_)));

        permissions
            .grant(&admin(), grant.clone(), &RequestMeta::empty())
            .unwrap();
        permissions
            .revoke(
                &admin(),
                &grant.subject,
                &grant.permission.key(),
                &RequestMeta::empty(),
            )
            .unwrap();

        for action in ["permission_granted", "permission_revoked"] {
            let hits = harness.audit_log.query(&AuditFilter {
                action: Some(action.to_string()),
                ..Default::default()
            });
            assert_eq!(hits.len(), 1, "expected one {action} entry");
        }
    }
}
