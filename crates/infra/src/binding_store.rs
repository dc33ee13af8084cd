//! Permission binding storage.

use std::sync::{Arc, RwLock};

use helmcrm_authz::{BindingSet, GrantSubject, PermissionGrant, PermissionKey, ResourceKind};
use helmcrm_core::Actor;

/// Binding store operation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindingStoreError {
    #[error("binding not found")]
    NotFound,
    #[error("binding store unavailable: {0}")]
    Unavailable(String),
}

/// Read-mostly store of permission grants.
///
/// `load_for_actor` is the resolver's single fetch per resolution call: it
/// returns every grant bound to the actor's role or to the actor's user id
/// for one resource. Mutations are administrative and rare; implementations
/// need no locking beyond their own consistency.
pub trait BindingStore: Send + Sync {
    /// Fetch the binding set for one `(actor, resource)` pair.
    fn load_for_actor(
        &self,
        actor: &Actor,
        resource: ResourceKind,
    ) -> Result<BindingSet, BindingStoreError>;

    /// Add a grant. Adding an identical grant again is a no-op.
    fn grant(&self, grant: PermissionGrant) -> Result<(), BindingStoreError>;

    /// Remove the grant matching `(subject, key)`.
    fn revoke(&self, subject: &GrantSubject, key: &PermissionKey) -> Result<(), BindingStoreError>;
}

impl<S> BindingStore for Arc<S>
where
    S: BindingStore + ?Sized,
{
    fn load_for_actor(
        &self,
        actor: &Actor,
        resource: ResourceKind,
    ) -> Result<BindingSet, BindingStoreError> {
        (**self).load_for_actor(actor, resource)
    }

    fn grant(&self, grant: PermissionGrant) -> Result<(), BindingStoreError> {
        (**self).grant(grant)
    }

    fn revoke(&self, subject: &GrantSubject, key: &PermissionKey) -> Result<(), BindingStoreError> {
        (**self).revoke(subject, key)
    }
}

/// In-memory binding store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryBindingStore {
    grants: RwLock<Vec<PermissionGrant>>,
}

impl InMemoryBindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.grants.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BindingStore for InMemoryBindingStore {
    fn load_for_actor(
        &self,
        actor: &Actor,
        resource: ResourceKind,
    ) -> Result<BindingSet, BindingStoreError> {
        let grants = self
            .grants
            .read()
            .map_err(|_| BindingStoreError::Unavailable("lock poisoned".to_string()))?;

        let relevant = grants
            .iter()
            .filter(|g| g.permission.resource == resource && g.subject.covers(actor))
            .cloned()
            .collect();

        Ok(BindingSet::new(relevant))
    }

    fn grant(&self, grant: PermissionGrant) -> Result<(), BindingStoreError> {
        let mut grants = self
            .grants
            .write()
            .map_err(|_| BindingStoreError::Unavailable("lock poisoned".to_string()))?;

        let duplicate = grants.iter().any(|g| {
            g.subject == grant.subject && g.permission.key() == grant.permission.key()
        });
        if !duplicate {
            grants.push(grant);
        }
        Ok(())
    }

    fn revoke(&self, subject: &GrantSubject, key: &PermissionKey) -> Result<(), BindingStoreError> {
        let mut grants = self
            .grants
            .write()
            .map_err(|_| BindingStoreError::Unavailable("lock poisoned".to_string()))?;

        let before = grants.len();
        grants.retain(|g| !(g.subject == *subject && g.permission.key() == *key));
        if grants.len() == before {
            return Err(BindingStoreError::NotFound);
        }
        Ok(())
    }
}
