use helmcrm_core::{Actor, UserId};

use crate::scope::Scope;

/// Directory of team relationships, supplied by the caller.
///
/// Only the resolver's narrow need is modeled: given a user, the set of user
/// ids whose records count as "team" records (including the user).
pub trait TeamDirectory {
    fn team_of(&self, user_id: UserId) -> Vec<UserId>;
}

/// Record-level visibility restriction implied by a scope.
///
/// Storage-agnostic: callers translate this into their own query predicate
/// (e.g. an owner-id filter on a leads listing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityFilter {
    /// No restriction.
    All,
    /// Records owned by one user.
    OwnedBy(UserId),
    /// Records owned by any of these users.
    AnyOf(Vec<UserId>),
    /// No records at all (unauthenticated caller).
    Nothing,
}

/// Compute the record-visibility filter for an actor at a scope.
pub fn visibility_filter(
    actor: &Actor,
    scope: Scope,
    directory: &dyn TeamDirectory,
) -> VisibilityFilter {
    let Some(user_id) = actor.user_id else {
        return VisibilityFilter::Nothing;
    };

    if actor.role.is_admin() || scope == Scope::All {
        return VisibilityFilter::All;
    }

    match scope {
        Scope::Own => VisibilityFilter::OwnedBy(user_id),
        Scope::Team => {
            let mut members = directory.team_of(user_id);
            if !members.contains(&user_id) {
                members.push(user_id);
            }
            VisibilityFilter::AnyOf(members)
        }
        Scope::All => VisibilityFilter::All,
    }
}
