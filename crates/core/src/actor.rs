use serde::{Deserialize, Serialize};

use crate::error::{AccessError, AccessResult};
use crate::id::UserId;
use crate::role::Role;

/// Authenticated-actor context for a single call.
///
/// Produced by the session layer (out of scope here) and passed into every
/// authorization-sensitive operation. An actor without a `user_id` resolves to
/// deny for every action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<UserId>,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role,
        }
    }

    /// An unauthenticated caller.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            role: Role::User,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The actor's user id, or `Unauthorized` when unauthenticated.
    pub fn require_user(&self) -> AccessResult<UserId> {
        self.user_id.ok_or(AccessError::Unauthorized)
    }
}
