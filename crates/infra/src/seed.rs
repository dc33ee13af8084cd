//! Default permission catalog seeding.
//!
//! Mirrors the shipped role matrix: admins get full access everywhere, sales
//! works own/team records with a few field restrictions, finance is
//! view-mostly with full invoice access.

use helmcrm_authz::{Permission, PermissionAction, PermissionGrant, ResourceKind, Scope};
use helmcrm_core::Role;

use crate::binding_store::{BindingStore, BindingStoreError};

use PermissionAction::*;
use ResourceKind::*;
use Scope::*;

type SeedRow = (Role, ResourceKind, PermissionAction, Option<&'static str>, Scope);

const DEFAULT_GRANTS: &[SeedRow] = &[
    // Admin: full access to every resource.
    (Role::Admin, Lead, ViewAll, None, All),
    (Role::Admin, Lead, Create, None, All),
    (Role::Admin, Lead, EditAll, None, All),
    (Role::Admin, Lead, Delete, None, All),
    (Role::Admin, Lead, Approve, None, All),
    (Role::Admin, Deal, ViewAll, None, All),
    (Role::Admin, Deal, Create, None, All),
    (Role::Admin, Deal, EditAll, None, All),
    (Role::Admin, Deal, Delete, None, All),
    (Role::Admin, Customer, ViewAll, None, All),
    (Role::Admin, Customer, Create, None, All),
    (Role::Admin, Customer, EditAll, None, All),
    (Role::Admin, Customer, Delete, None, All),
    (Role::Admin, Product, ViewAll, None, All),
    (Role::Admin, Product, Create, None, All),
    (Role::Admin, Product, EditAll, None, All),
    (Role::Admin, Product, Delete, None, All),
    (Role::Admin, Product, Approve, None, All),
    (Role::Admin, Quote, ViewAll, None, All),
    (Role::Admin, Quote, Create, None, All),
    (Role::Admin, Quote, EditAll, None, All),
    (Role::Admin, Quote, Delete, None, All),
    (Role::Admin, Quote, Approve, None, All),
    (Role::Admin, Invoice, ViewAll, None, All),
    (Role::Admin, Invoice, Create, None, All),
    (Role::Admin, Invoice, EditAll, None, All),
    (Role::Admin, Invoice, Delete, None, All),
    (Role::Admin, Invoice, Approve, None, All),
    (Role::Admin, AuditLog, ViewAll, None, All),
    // Sales: own records plus team visibility.
    (Role::Sales, Lead, View, None, Own),
    (Role::Sales, Lead, View, None, Team),
    (Role::Sales, Lead, Create, None, Own),
    (Role::Sales, Lead, Update, None, Own),
    (Role::Sales, Deal, View, None, Own),
    (Role::Sales, Deal, View, None, Team),
    (Role::Sales, Deal, Create, None, Own),
    (Role::Sales, Deal, Update, None, Own),
    (Role::Sales, Quote, View, None, Own),
    (Role::Sales, Quote, View, None, Team),
    (Role::Sales, Quote, Create, None, Own),
    (Role::Sales, Quote, Update, None, Own),
    (Role::Sales, Customer, View, None, All),
    (Role::Sales, Customer, Create, None, Own),
    (Role::Sales, Customer, Update, None, Own),
    (Role::Sales, Product, View, None, All),
    (Role::Sales, Invoice, View, None, Own),
    (Role::Sales, Invoice, View, None, Team),
    // Finance: view-mostly, full invoice access, invoice approvals.
    (Role::Finance, Lead, View, None, All),
    (Role::Finance, Deal, View, None, All),
    (Role::Finance, Customer, View, None, All),
    (Role::Finance, Product, View, None, All),
    (Role::Finance, Quote, View, None, All),
    (Role::Finance, Quote, Approve, None, All),
    (Role::Finance, Invoice, ViewAll, None, All),
    (Role::Finance, Invoice, Create, None, All),
    (Role::Finance, Invoice, EditAll, None, All),
    (Role::Finance, Invoice, Approve, None, All),
    // Field-level rows: sensitive fields stay view-only for sales.
    (Role::Sales, Product, View, Some("unitPrice"), All),
    (Role::Sales, Customer, View, Some("gstNo"), All),
    (Role::Sales, Customer, Update, Some("gstNo"), All),
    (Role::Finance, Lead, View, Some("gstNo"), All),
    (Role::Finance, Lead, View, Some("vatNumber"), All),
];

/// Load the default catalog into a binding store.
pub fn default_catalog(store: &impl BindingStore) -> Result<(), BindingStoreError> {
    for (role, resource, action, field, scope) in DEFAULT_GRANTS {
        let mut permission = Permission::new(*resource, *action, *scope);
        if let Some(field) = field {
            permission = permission.with_field(*field);
        }
        store.grant(PermissionGrant::for_role(*role, permission))?;
    }
    Ok(())
}
