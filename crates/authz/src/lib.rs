//! `helmcrm-authz` — pure authorization boundary.
//!
//! This crate models the permission catalog (resource, action, field, scope)
//! and resolves allow/deny decisions over a [`BindingSet`] — the grants
//! fetched once per resolution call by the storage layer. It is intentionally
//! decoupled from HTTP and storage: no IO, no panics, no business logic.

pub mod field;
pub mod grant;
pub mod permission;
pub mod scope;
pub mod visibility;

pub use field::{
    FieldAccessMode, FieldDefaults, FieldPermission, FieldPermissions, apply_field_permissions,
    field_permissions,
};
pub use grant::{BindingSet, GrantSubject, PermissionGrant};
pub use permission::{Permission, PermissionAction, PermissionId, PermissionKey, ResourceKind};
pub use scope::Scope;
pub use visibility::{TeamDirectory, VisibilityFilter, visibility_filter};
