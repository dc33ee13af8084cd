use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use helmcrm_core::Actor;

use crate::grant::BindingSet;

/// Per-field view/edit decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPermission {
    pub view: bool,
    pub edit: bool,
}

/// Default decision for fields with no explicit binding.
///
/// The default policy is "viewable, not editable": absence of a rule allows
/// view, absence of an edit-granting binding denies edit. The default is
/// configurable rather than hard-coded so a deployment can flip it against its
/// catalog seeding policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefaults {
    pub view: bool,
    pub edit: bool,
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self {
            view: true,
            edit: false,
        }
    }
}

impl FieldDefaults {
    fn as_permission(self) -> FieldPermission {
        FieldPermission {
            view: self.view,
            edit: self.edit,
        }
    }
}

/// Resolved field-level permissions for one `(actor, resource)` pair.
///
/// Holds the explicitly configured fields; anything else falls back to the
/// defaults. An admin's map is unrestricted regardless of configured rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPermissions {
    explicit: BTreeMap<String, FieldPermission>,
    defaults: FieldDefaults,
    unrestricted: bool,
}

impl FieldPermissions {
    pub fn unrestricted() -> Self {
        Self {
            explicit: BTreeMap::new(),
            defaults: FieldDefaults::default(),
            unrestricted: true,
        }
    }

    pub fn get(&self, field: &str) -> FieldPermission {
        if self.unrestricted {
            return FieldPermission {
                view: true,
                edit: true,
            };
        }
        self.explicit
            .get(field)
            .copied()
            .unwrap_or_else(|| self.defaults.as_permission())
    }

    pub fn can_view(&self, field: &str) -> bool {
        self.get(field).view
    }

    pub fn can_edit(&self, field: &str) -> bool {
        self.get(field).edit
    }

    /// Fields with an explicit binding, in field-name order.
    pub fn explicit(&self) -> &BTreeMap<String, FieldPermission> {
        &self.explicit
    }
}

/// Which access mode a field payload is being checked for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldAccessMode {
    View,
    Edit,
}

/// Resolve the field-permission map for an actor over a fetched binding set.
///
/// Each field mentioned by a field-bearing grant accumulates view/edit from
/// the actions granted on it (view ⇐ view/view_all/edit_all, edit ⇐
/// update/edit_all). User-scoped grants override role-scoped grants with the
/// same permission key before accumulation. Fields not covered by any grant
/// take the defaults.
pub fn field_permissions(
    actor: &Actor,
    bindings: &BindingSet,
    defaults: FieldDefaults,
) -> FieldPermissions {
    if actor.role.is_admin() {
        return FieldPermissions::unrestricted();
    }

    let mut explicit: BTreeMap<String, FieldPermission> = BTreeMap::new();

    if actor.is_authenticated() {
        for grant in bindings.effective_grants() {
            let Some(field) = grant.permission.field.as_deref() else {
                continue;
            };
            let entry = explicit.entry(field.to_string()).or_insert(FieldPermission {
                view: false,
                edit: false,
            });
            entry.view |= grant.permission.action.grants_view();
            entry.edit |= grant.permission.action.grants_edit();
        }
    }

    FieldPermissions {
        explicit,
        defaults,
        unrestricted: false,
    }
}

/// Strip fields the actor may not see (or edit) from a JSON object.
///
/// Non-object values pass through untouched; unknown fields are kept or
/// dropped according to the map's defaults.
pub fn apply_field_permissions(
    value: JsonValue,
    permissions: &FieldPermissions,
    mode: FieldAccessMode,
) -> JsonValue {
    let JsonValue::Object(map) = value else {
        return value;
    };

    let filtered = map
        .into_iter()
        .filter(|(field, _)| match mode {
            FieldAccessMode::View => permissions.can_view(field),
            FieldAccessMode::Edit => permissions.can_edit(field),
        })
        .collect();

    JsonValue::Object(filtered)
}
