use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::models::{
    GlobalIdentity, IdentityCategory, OrgIdentity, ResolvedIdentity, SocialIdentity,
    UserAuthState,
};
use crate::services::{IdentitySnapshot, ServiceError};

/// Storage for users' identities and org memberships.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Read the user's password state and every identity they own.
    /// `None` when the user does not exist.
    async fn load_snapshot(&self, user_id: i64) -> Result<Option<IdentitySnapshot>, ServiceError>;

    /// Re-resolve the user's identities and delete `(category, identity_id)` if it
    /// may be disconnected. Check and delete happen in one critical section, so
    /// concurrent disconnects for the same user cannot both pass a stale check.
    async fn disconnect_identity(
        &self,
        user_id: i64,
        category: IdentityCategory,
        identity_id: i64,
    ) -> Result<ResolvedIdentity, ServiceError>;

    /// Membership id of the user in the organization.
    async fn find_member_id(
        &self,
        organization_id: i64,
        user_id: i64,
    ) -> Result<Option<i64>, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// In-memory identity store for tests and local runs.
pub struct MockIdentityStore {
    users: Mutex<HashMap<i64, IdentitySnapshot>>,
    memberships: Mutex<HashMap<(i64, i64), i64>>,
    next_id: AtomicI64,
}

impl Default for MockIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            memberships: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn with_user<T>(
        &self,
        user_id: i64,
        f: impl FnOnce(&mut IdentitySnapshot) -> T,
    ) -> Result<T, ServiceError> {
        let mut users = self
            .users
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock identity store mutex poisoned: {}", e))?;
        let snapshot = users.get_mut(&user_id).ok_or(ServiceError::UserNotFound)?;
        Ok(f(snapshot))
    }

    pub fn insert_user(&self, user: UserAuthState) -> Result<(), ServiceError> {
        self.users
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock identity store mutex poisoned: {}", e))?
            .insert(user.user_id, IdentitySnapshot::new(user));
        Ok(())
    }

    pub fn add_social_identity(&self, user_id: i64, provider: &str) -> Result<i64, ServiceError> {
        let id = self.next_id();
        self.with_user(user_id, |s| {
            s.social.push(SocialIdentity::new(
                id,
                user_id,
                provider,
                format!("{}-{}", provider, id),
            ))
        })?;
        Ok(id)
    }

    pub fn add_global_identity(&self, user_id: i64, provider: &str) -> Result<i64, ServiceError> {
        let id = self.next_id();
        self.with_user(user_id, |s| {
            s.global.push(GlobalIdentity::new(
                id,
                user_id,
                provider,
                format!("{}-{}", provider, id),
            ))
        })?;
        Ok(id)
    }

    pub fn add_org_identity(
        &self,
        user_id: i64,
        organization_id: i64,
        allow_unlinked: bool,
    ) -> Result<i64, ServiceError> {
        let id = self.next_id();
        self.with_user(user_id, |s| {
            s.org.push(OrgIdentity::new(
                id,
                user_id,
                organization_id,
                format!("org-{}", organization_id),
                "saml2",
                allow_unlinked,
            ))
        })?;
        Ok(id)
    }

    pub fn add_membership(&self, organization_id: i64, user_id: i64) -> Result<i64, ServiceError> {
        let member_id = self.next_id();
        self.memberships
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock identity store mutex poisoned: {}", e))?
            .insert((organization_id, user_id), member_id);
        Ok(member_id)
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn load_snapshot(&self, user_id: i64) -> Result<Option<IdentitySnapshot>, ServiceError> {
        let users = self
            .users
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock identity store mutex poisoned: {}", e))?;
        Ok(users.get(&user_id).cloned())
    }

    async fn disconnect_identity(
        &self,
        user_id: i64,
        category: IdentityCategory,
        identity_id: i64,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let mut users = self
            .users
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock identity store mutex poisoned: {}", e))?;
        let snapshot = users
            .get_mut(&user_id)
            .ok_or(ServiceError::IdentityNotFound)?;

        let resolved = snapshot.authorize_disconnect(category, identity_id)?;
        snapshot.remove(category, identity_id);
        Ok(resolved)
    }

    async fn find_member_id(
        &self,
        organization_id: i64,
        user_id: i64,
    ) -> Result<Option<i64>, ServiceError> {
        let memberships = self
            .memberships
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock identity store mutex poisoned: {}", e))?;
        Ok(memberships.get(&(organization_id, user_id)).copied())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
