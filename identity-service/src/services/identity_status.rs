//! Disconnect-eligibility rules for a user's linked identities.
//!
//! The status of one identity depends on the user's password state and on how
//! many global identities they hold, so statuses are always computed over the
//! complete set of identities read in one snapshot. Nothing here is persisted.

use crate::models::{
    GlobalIdentity, IdentityCategory, IdentityRecord, IdentityStatus, OrgIdentity,
    ResolvedIdentity, SocialIdentity, UserAuthState,
};
use crate::services::ServiceError;

/// Everything needed to decide identity statuses for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub has_usable_password: bool,
    pub social: Vec<SocialIdentity>,
    pub global: Vec<GlobalIdentity>,
    pub org: Vec<OrgIdentity>,
}

impl IdentitySnapshot {
    pub fn new(user: UserAuthState) -> Self {
        Self {
            has_usable_password: user.has_usable_password,
            ..Self::default()
        }
    }

    /// Pair every identity with its status: social first, then global, then org.
    pub fn resolve(&self) -> impl Iterator<Item = ResolvedIdentity> + '_ {
        let global_status = global_identity_status(self.has_usable_password, self.global.len());

        let social = self.social.iter().map(|identity| {
            ResolvedIdentity::new(
                IdentityRecord::Social(identity.clone()),
                IdentityStatus::CanDisconnect,
            )
        });

        let global = self.global.iter().map(move |identity| {
            ResolvedIdentity::new(IdentityRecord::Global(identity.clone()), global_status)
        });

        let org = self.org.iter().map(move |identity| {
            let status =
                org_identity_status(identity, self.has_usable_password, self.global.len());
            ResolvedIdentity::new(IdentityRecord::Org(identity.clone()), status)
        });

        social.chain(global).chain(org)
    }

    /// Linear scan over the resolved set. The whole set has to be resolved
    /// anyway, so there is no keyed shortcut.
    pub fn find(&self, category: IdentityCategory, identity_id: i64) -> Option<ResolvedIdentity> {
        self.resolve()
            .find(|resolved| resolved.matches(category, identity_id))
    }

    /// Decide whether `(category, identity_id)` may be deleted right now.
    pub fn authorize_disconnect(
        &self,
        category: IdentityCategory,
        identity_id: i64,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let resolved = self
            .find(category, identity_id)
            .ok_or(ServiceError::IdentityNotFound)?;

        if resolved.status != IdentityStatus::CanDisconnect {
            return Err(ServiceError::DisconnectNotAllowed(resolved.status));
        }

        Ok(resolved)
    }

    /// Drop a record from the snapshot after it has been deleted from storage.
    pub fn remove(&mut self, category: IdentityCategory, identity_id: i64) -> bool {
        let before = self.len();
        match category {
            IdentityCategory::SocialIdentity => self.social.retain(|i| i.id != identity_id),
            IdentityCategory::GlobalIdentity => self.global.retain(|i| i.id != identity_id),
            IdentityCategory::OrgIdentity => self.org.retain(|i| i.id != identity_id),
        }
        self.len() != before
    }

    pub fn len(&self) -> usize {
        self.social.len() + self.global.len() + self.org.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A global identity may go if the user can still log in with a password or
/// another global identity. Org identities are not a fallback: losing org
/// membership must not lock the user out of their account.
pub fn global_identity_status(has_usable_password: bool, global_count: usize) -> IdentityStatus {
    if has_usable_password || global_count > 1 {
        IdentityStatus::CanDisconnect
    } else {
        IdentityStatus::NeededForGlobalAuth
    }
}

/// An org identity is pinned while its org requires SSO. Otherwise it may go
/// if the user has a password or any global identity.
///
/// Without either, the identity is assumed to be the user's only way in. A
/// user holding several org identities from orgs that don't require SSO is
/// still reported as `NeededForGlobalAuth` for each of them; that case is rare
/// enough to accept the false negative.
pub fn org_identity_status(
    identity: &OrgIdentity,
    has_usable_password: bool,
    global_count: usize,
) -> IdentityStatus {
    if !identity.allow_unlinked {
        IdentityStatus::NeededForOrgAuth
    } else if has_usable_password || global_count > 0 {
        IdentityStatus::CanDisconnect
    } else {
        IdentityStatus::NeededForGlobalAuth
    }
}
