use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use helmcrm_core::{Actor, Role, UserId};

use crate::permission::{Permission, PermissionAction, PermissionKey};
use crate::scope::Scope;

/// Subject a permission is bound to: a whole role, or one specific user.
///
/// A user-scoped binding takes precedence over a role-scoped binding for the
/// same permission key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum GrantSubject {
    Role(Role),
    User(UserId),
}

impl GrantSubject {
    pub fn is_user(&self) -> bool {
        matches!(self, GrantSubject::User(_))
    }

    /// Whether this subject covers the given actor.
    pub fn covers(&self, actor: &Actor) -> bool {
        match self {
            GrantSubject::Role(role) => *role == actor.role,
            GrantSubject::User(user_id) => actor.user_id == Some(*user_id),
        }
    }
}

/// An assignment of a catalog permission to a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub subject: GrantSubject,
    pub permission: Permission,
}

impl PermissionGrant {
    pub fn for_role(role: Role, permission: Permission) -> Self {
        Self {
            subject: GrantSubject::Role(role),
            permission,
        }
    }

    pub fn for_user(user_id: UserId, permission: Permission) -> Self {
        Self {
            subject: GrantSubject::User(user_id),
            permission,
        }
    }
}

/// All grants relevant to one `(actor, resource)` pair.
///
/// The storage layer fetches this once per resolution call; every query within
/// that call shares the fetch. Decisions are computed freshly per request —
/// binding sets are never cached across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    grants: Vec<PermissionGrant>,
}

impl BindingSet {
    pub fn new(grants: Vec<PermissionGrant>) -> Self {
        Self { grants }
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn grants(&self) -> &[PermissionGrant] {
        &self.grants
    }

    /// Grants after user-over-role precedence is applied.
    ///
    /// Role-scoped grants are indexed by permission key, then user-scoped
    /// grants replace any role-scoped grant with an identical key. Grants with
    /// distinct keys accumulate.
    pub fn effective_grants(&self) -> Vec<&PermissionGrant> {
        let mut by_key: HashMap<PermissionKey, &PermissionGrant> = HashMap::new();

        for grant in self.grants.iter().filter(|g| !g.subject.is_user()) {
            by_key.insert(grant.permission.key(), grant);
        }
        for grant in self.grants.iter().filter(|g| g.subject.is_user()) {
            by_key.insert(grant.permission.key(), grant);
        }

        by_key.into_values().collect()
    }

    /// Whole-resource check: may the actor perform `action` at `scope`?
    ///
    /// A grant matches when its action matches and its scope satisfies the
    /// requested scope (`own < team < all`). Admins short-circuit to allow;
    /// an actor without identity is always denied.
    pub fn allows(&self, actor: &Actor, action: PermissionAction, scope: Scope) -> bool {
        if !actor.is_authenticated() {
            return false;
        }
        if actor.role.is_admin() {
            return true;
        }

        self.effective_grants().iter().any(|grant| {
            grant.permission.action == action && grant.permission.scope.satisfies(scope)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::ResourceKind;

    fn view_own() -> Permission {
        Permission::new(ResourceKind::Lead, PermissionAction::View, Scope::Own)
    }

    fn sales_actor() -> Actor {
        Actor::new(UserId::new(), Role::Sales)
    }

    #[test]
    fn missing_actor_is_always_denied() {
        let set = BindingSet::new(vec![PermissionGrant::for_role(
            Role::User,
            Permission::new(ResourceKind::Lead, PermissionAction::View, Scope::All),
        )]);
        assert!(!set.allows(&Actor::anonymous(), PermissionAction::View, Scope::Own));
    }

    #[test]
    fn own_grant_never_satisfies_team_or_all() {
        let actor = sales_actor();
        let set = BindingSet::new(vec![PermissionGrant::for_role(Role::Sales, view_own())]);

        assert!(set.allows(&actor, PermissionAction::View, Scope::Own));
        assert!(!set.allows(&actor, PermissionAction::View, Scope::Team));
        assert!(!set.allows(&actor, PermissionAction::View, Scope::All));
    }

    #[test]
    fn all_grant_satisfies_every_scope() {
        let actor = sales_actor();
        let set = BindingSet::new(vec![PermissionGrant::for_role(
            Role::Sales,
            Permission::new(ResourceKind::Lead, PermissionAction::View, Scope::All),
        )]);

        assert!(set.allows(&actor, PermissionAction::View, Scope::Own));
        assert!(set.allows(&actor, PermissionAction::View, Scope::Team));
        assert!(set.allows(&actor, PermissionAction::View, Scope::All));
    }

    #[test]
    fn user_grant_replaces_role_grant_with_identical_key() {
        let user_id = UserId::new();
        let permission = view_own();
        let mut user_permission = permission.clone();
        user_permission.id = crate::permission::PermissionId::new();

        let set = BindingSet::new(vec![
            PermissionGrant::for_role(Role::Sales, permission),
            PermissionGrant::for_user(user_id, user_permission),
        ]);

        let effective = set.effective_grants();
        assert_eq!(effective.len(), 1);
        assert!(effective[0].subject.is_user());
    }

    #[test]
    fn user_grants_with_distinct_keys_accumulate() {
        let user_id = UserId::new();
        let actor = Actor::new(user_id, Role::Sales);
        let set = BindingSet::new(vec![
            PermissionGrant::for_role(Role::Sales, view_own()),
            PermissionGrant::for_user(
                user_id,
                Permission::new(ResourceKind::Lead, PermissionAction::Update, Scope::All),
            ),
        ]);

        assert!(set.allows(&actor, PermissionAction::View, Scope::Own));
        assert!(set.allows(&actor, PermissionAction::Update, Scope::All));
    }

    #[test]
    fn admin_short_circuits_to_allow() {
        let actor = Actor::new(UserId::new(), Role::Admin);
        let set = BindingSet::default();
        assert!(set.allows(&actor, PermissionAction::Delete, Scope::All));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn scope_strategy() -> impl Strategy<Value = Scope> {
            prop_oneof![Just(Scope::Own), Just(Scope::Team), Just(Scope::All)]
        }

        proptest! {
            /// Property: a grant satisfies a request iff the granted scope is
            /// at least as wide, for every (granted, requested) pair.
            #[test]
            fn scope_satisfaction_matches_ordering(
                granted in scope_strategy(),
                requested in scope_strategy(),
            ) {
                let actor = sales_actor();
                let set = BindingSet::new(vec![PermissionGrant::for_role(
                    Role::Sales,
                    Permission::new(ResourceKind::Lead, PermissionAction::View, granted),
                )]);

                prop_assert_eq!(
                    set.allows(&actor, PermissionAction::View, requested),
                    granted >= requested
                );
            }

            /// Property: adding a grant never revokes an existing allow.
            #[test]
            fn grants_are_monotonic(
                granted in scope_strategy(),
                requested in scope_strategy(),
                extra in scope_strategy(),
            ) {
                let actor = sales_actor();
                let base = vec![PermissionGrant::for_role(
                    Role::Sales,
                    Permission::new(ResourceKind::Lead, PermissionAction::View, granted),
                )];
                let allowed_before = BindingSet::new(base.clone())
                    .allows(&actor, PermissionAction::View, requested);

                let mut widened = base;
                widened.push(PermissionGrant::for_role(
                    Role::Sales,
                    Permission::new(ResourceKind::Lead, PermissionAction::Update, extra),
                ));
                let allowed_after = BindingSet::new(widened)
                    .allows(&actor, PermissionAction::View, requested);

                prop_assert!(!allowed_before || allowed_after);
            }
        }
    }
}
