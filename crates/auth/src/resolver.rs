use super::*;
use std::sync::Arc;
use warden_core::ID;
use warden_core::Unique;

/// Role-derived permission aggregation and point-in-time checks.
///
/// Assignment and removal are idempotent: assigning a held role or removing
/// an unheld one is a no-op, not an error. Events land in the outbox only
/// when something actually changed.
pub struct Access<S> {
    store: S,
    outbox: Arc<Outbox>,
}

impl<S: Store> Access<S> {
    pub fn new(store: S, outbox: Arc<Outbox>) -> Self {
        Self { store, outbox }
    }

    /// True iff the user holds, through any active role, an active
    /// permission whose (resource, action) match exactly.
    pub async fn has_permission(
        &self,
        user: ID<User>,
        resource: &str,
        action: &str,
    ) -> Result<bool, AuthError> {
        Ok(self
            .store
            .permissions_of(user)
            .await?
            .iter()
            .any(|p| p.matches(resource, action)))
    }

    /// De-duplicated: a permission reachable via two roles appears once.
    pub async fn permissions_of(&self, user: ID<User>) -> Result<Vec<Permission>, AuthError> {
        let mut permissions = self.store.permissions_of(user).await?;
        permissions.sort_by_key(|p| p.id());
        permissions.dedup_by_key(|p| p.id());
        Ok(permissions)
    }

    pub async fn roles_of(&self, user: ID<User>) -> Result<Vec<Role>, AuthError> {
        let mut roles = self.store.roles_of(user).await?;
        roles.sort_by_key(|r| r.id());
        roles.dedup_by_key(|r| r.id());
        Ok(roles)
    }

    pub async fn assign_role(
        &self,
        user: ID<User>,
        role: ID<Role>,
        assigned_by: Option<&str>,
    ) -> Result<(), AuthError> {
        if self.store.assign_role(user, role, assigned_by).await? {
            self.outbox.push(Event::RoleAssigned { user, role });
        }
        Ok(())
    }

    pub async fn remove_role(&self, user: ID<User>, role: ID<Role>) -> Result<(), AuthError> {
        if self.store.remove_role(user, role).await? {
            self.outbox.push(Event::RoleRemoved { user, role });
        }
        Ok(())
    }

    pub async fn grant_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
        assigned_by: Option<&str>,
    ) -> Result<(), AuthError> {
        self.store
            .grant_permission(role, permission, assigned_by)
            .await
            .map(|_| ())
    }

    pub async fn revoke_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
    ) -> Result<(), AuthError> {
        self.store.revoke_permission(role, permission).await.map(|_| ())
    }
}
