//! Permission resolution against a binding store.

use serde_json::json;

use helmcrm_audit::{AuditEntry, AuditWriter, RequestMeta};
use helmcrm_authz::{
    BindingSet, FieldDefaults, FieldPermissions, GrantSubject, PermissionAction, PermissionGrant,
    PermissionKey, ResourceKind, Scope, field_permissions,
};
use helmcrm_core::{AccessError, AccessResult, Actor};

use crate::binding_store::{BindingStore, BindingStoreError};

/// Resolver façade over a binding store.
///
/// Decisions are computed freshly per request: every call fetches the binding
/// set once and resolves over it. There is no process-wide cache of resolved
/// decisions — bindings can change between requests. A store failure denies
/// the whole request; the resolver never fails open.
pub struct PermissionService<B> {
    bindings: B,
    defaults: FieldDefaults,
    audit: AuditWriter,
}

impl<B: BindingStore> PermissionService<B> {
    pub fn new(bindings: B, audit: AuditWriter) -> Self {
        Self {
            bindings,
            defaults: FieldDefaults::default(),
            audit,
        }
    }

    pub fn with_field_defaults(mut self, defaults: FieldDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn load(&self, actor: &Actor, resource: ResourceKind) -> AccessResult<BindingSet> {
        self.bindings
            .load_for_actor(actor, resource)
            .map_err(|e| match e {
                BindingStoreError::Unavailable(msg) => AccessError::store_unavailable(msg),
                BindingStoreError::NotFound => AccessError::not_found(),
            })
    }

    /// May the actor perform `action` on `resource` at `scope`?
    pub fn has_permission(
        &self,
        actor: &Actor,
        resource: ResourceKind,
        action: PermissionAction,
        scope: Scope,
    ) -> AccessResult<bool> {
        if !actor.is_authenticated() {
            return Ok(false);
        }
        let bindings = self.load(actor, resource)?;
        Ok(bindings.allows(actor, action, scope))
    }

    /// Like [`has_permission`](Self::has_permission), but maps deny to a typed
    /// failure and writes one audit entry per deny.
    pub fn require(
        &self,
        actor: &Actor,
        resource: ResourceKind,
        action: PermissionAction,
        scope: Scope,
    ) -> AccessResult<()> {
        if !actor.is_authenticated() {
            self.audit_deny(actor, resource, action, scope, "unauthenticated");
            return Err(AccessError::Unauthorized);
        }

        match self.has_permission(actor, resource, action, scope) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.audit_deny(actor, resource, action, scope, "missing permission");
                Err(AccessError::forbidden(format!(
                    "{action} on {resource} at scope {scope}"
                )))
            }
            Err(e) => {
                self.audit_deny(actor, resource, action, scope, "store unavailable");
                Err(e)
            }
        }
    }

    /// Field-level view/edit map for the actor on a resource.
    pub fn field_permissions(
        &self,
        actor: &Actor,
        resource: ResourceKind,
    ) -> AccessResult<FieldPermissions> {
        let bindings = self.load(actor, resource)?;
        Ok(field_permissions(actor, &bindings, self.defaults))
    }

    /// Add a binding. Administrators only; the mutation is audited.
    pub fn grant(
        &self,
        actor: &Actor,
        grant: PermissionGrant,
        meta: &RequestMeta,
    ) -> AccessResult<()> {
        let admin = self.require_admin(actor)?;

        self.bindings.grant(grant.clone()).map_err(|e| match e {
            BindingStoreError::Unavailable(msg) => AccessError::store_unavailable(msg),
            BindingStoreError::NotFound => AccessError::not_found(),
        })?;

        self.audit.record(
            AuditEntry::new("permission_granted", grant.permission.resource.as_str())
                .by(Some(admin))
                .with_details(json!({
                    "subject": grant.subject,
                    "action": grant.permission.action.as_str(),
                    "field": grant.permission.field,
                    "scope": grant.permission.scope.as_str(),
                }))
                .with_meta(meta),
        );
        Ok(())
    }

    /// Remove a binding. Administrators only; the mutation is audited.
    pub fn revoke(
        &self,
        actor: &Actor,
        subject: &GrantSubject,
        key: &PermissionKey,
        meta: &RequestMeta,
    ) -> AccessResult<()> {
        let admin = self.require_admin(actor)?;

        self.bindings.revoke(subject, key).map_err(|e| match e {
            BindingStoreError::Unavailable(msg) => AccessError::store_unavailable(msg),
            BindingStoreError::NotFound => AccessError::not_found(),
        })?;

        self.audit.record(
            AuditEntry::new("permission_revoked", key.resource.as_str())
                .by(Some(admin))
                .with_details(json!({
                    "subject": subject,
                    "action": key.action.as_str(),
                    "field": key.field,
                    "scope": key.scope.as_str(),
                }))
                .with_meta(meta),
        );
        Ok(())
    }

    fn require_admin(&self, actor: &Actor) -> AccessResult<helmcrm_core::UserId> {
        let user_id = actor.require_user()?;
        if !actor.role.is_admin() {
            return Err(AccessError::forbidden("binding mutations require admin"));
        }
        Ok(user_id)
    }

    fn audit_deny(
        &self,
        actor: &Actor,
        resource: ResourceKind,
        action: PermissionAction,
        scope: Scope,
        reason: &str,
    ) {
        self.audit.record(
            AuditEntry::new("permission_denied", resource.as_str())
                .by(actor.user_id)
                .with_details(json!({
                    "action": action.as_str(),
                    "scope": scope.as_str(),
                    "reason": reason,
                })),
        );
    }
}

impl<B: core::fmt::Debug> core::fmt::Debug for PermissionService<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionService")
            .field("bindings", &self.bindings)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
