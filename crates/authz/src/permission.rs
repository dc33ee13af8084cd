use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use helmcrm_core::AccessError;

use crate::scope::Scope;

/// Identifier of a catalog permission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(Uuid);

impl PermissionId {
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

impl Default for PermissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for PermissionId {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| AccessError::invalid_argument(format!("PermissionId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Domain resource a permission applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Lead,
    Deal,
    Customer,
    Product,
    Quote,
    Invoice,
    SalesOrder,
    ProformaInvoice,
    ApprovalRequest,
    AuditLog,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Lead => "lead",
            ResourceKind::Deal => "deal",
            ResourceKind::Customer => "customer",
            ResourceKind::Product => "product",
            ResourceKind::Quote => "quote",
            ResourceKind::Invoice => "invoice",
            ResourceKind::SalesOrder => "sales_order",
            ResourceKind::ProformaInvoice => "proforma_invoice",
            ResourceKind::ApprovalRequest => "approval_request",
            ResourceKind::AuditLog => "audit_log",
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action a permission grants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    View,
    ViewAll,
    Create,
    Update,
    EditAll,
    Delete,
    Approve,
    Execute,
}

impl PermissionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::View => "view",
            PermissionAction::ViewAll => "view_all",
            PermissionAction::Create => "create",
            PermissionAction::Update => "update",
            PermissionAction::EditAll => "edit_all",
            PermissionAction::Delete => "delete",
            PermissionAction::Approve => "approve",
            PermissionAction::Execute => "execute",
        }
    }

    /// Whether a field-level grant of this action makes the field viewable.
    pub fn grants_view(&self) -> bool {
        matches!(
            self,
            PermissionAction::View | PermissionAction::ViewAll | PermissionAction::EditAll
        )
    }

    /// Whether a field-level grant of this action makes the field editable.
    pub fn grants_edit(&self) -> bool {
        matches!(self, PermissionAction::Update | PermissionAction::EditAll)
    }
}

impl core::fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a permission: `(resource, action, field, scope)`.
///
/// Unique within the catalog; also the override key between user-scoped and
/// role-scoped bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionKey {
    pub resource: ResourceKind,
    pub action: PermissionAction,
    pub field: Option<String>,
    pub scope: Scope,
}

/// A catalog permission record.
///
/// Pure data: identity plus descriptive metadata. Immutable once referenced by
/// a binding, except for `description`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub resource: ResourceKind,
    pub action: PermissionAction,
    /// `None` = whole-resource permission.
    pub field: Option<String>,
    pub scope: Scope,
    pub description: Option<String>,
}

impl Permission {
    pub fn new(resource: ResourceKind, action: PermissionAction, scope: Scope) -> Self {
        Self {
            id: PermissionId::new(),
            resource,
            action,
            field: None,
            scope,
            description: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey {
            resource: self.resource,
            action: self.action,
            field: self.field.clone(),
            scope: self.scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_captures_identity_without_metadata() {
        let a = Permission::new(ResourceKind::Lead, PermissionAction::View, Scope::Own)
            .with_description("sales can view own leads");
        let b = Permission::new(ResourceKind::Lead, PermissionAction::View, Scope::Own);
        // Distinct ids and descriptions, same identity.
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn field_grants_map_to_view_and_edit() {
        assert!(PermissionAction::View.grants_view());
        assert!(PermissionAction::EditAll.grants_view());
        assert!(PermissionAction::EditAll.grants_edit());
        assert!(PermissionAction::Update.grants_edit());
        assert!(!PermissionAction::View.grants_edit());
        assert!(!PermissionAction::Delete.grants_view());
    }
}
