//! Bulk deletion queueing for issue groups.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::{Group, GroupStatus};
use crate::services::ServiceError;

/// Bulk mutations are capped per request.
pub const MAX_BULK_GROUPS: usize = 1000;

#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Groups among `group_ids` that belong to the project and organization
    /// and are not already pending deletion or being deleted.
    async fn find_deletable_groups(
        &self,
        organization_id: i64,
        project_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Group>, ServiceError>;

    /// Move groups to `pending_deletion`, skipping ones already on their way out.
    /// Returns the number of rows changed.
    async fn mark_pending_deletion(&self, group_ids: &[i64]) -> Result<u64, ServiceError>;
}

/// Deletion order: smallest groups first, ties broken by id. Groups already
/// being deleted are dropped.
pub fn plan_group_deletion(groups: Vec<Group>) -> Vec<Group> {
    let mut plan: Vec<Group> = groups
        .into_iter()
        .filter(|g| !g.status().is_being_deleted())
        .collect();
    plan.sort_by_key(|g| (g.times_seen, g.id));
    plan
}

/// Outcome of a bulk delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedDeletion {
    pub transaction_id: String,
    pub group_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn GroupStore>,
}

impl GroupService {
    pub fn new(store: Arc<dyn GroupStore>) -> Self {
        Self { store }
    }

    /// Mark the requested groups for deletion.
    ///
    /// `Ok(None)` when none of the ids name a deletable group of the project.
    #[tracing::instrument(skip(self, group_ids), fields(requested = group_ids.len()))]
    pub async fn delete_groups(
        &self,
        organization_id: i64,
        project_id: i64,
        group_ids: &[i64],
    ) -> Result<Option<QueuedDeletion>, ServiceError> {
        let ids: Vec<i64> = group_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if ids.is_empty() {
            return Err(ServiceError::InvalidQuery(
                "At least one group id is required".to_string(),
            ));
        }
        if ids.len() > MAX_BULK_GROUPS {
            return Err(ServiceError::InvalidQuery(format!(
                "Bulk deletion is limited to {} groups",
                MAX_BULK_GROUPS
            )));
        }

        let groups = self
            .store
            .find_deletable_groups(organization_id, project_id, &ids)
            .await?;
        let plan = plan_group_deletion(groups);
        if plan.is_empty() {
            return Ok(None);
        }

        let planned_ids: Vec<i64> = plan.iter().map(|g| g.id).collect();
        let updated = self.store.mark_pending_deletion(&planned_ids).await?;
        let transaction_id = Uuid::new_v4().simple().to_string();

        for group in &plan {
            tracing::info!(
                object_id = group.id,
                organization_id,
                transaction_id = %transaction_id,
                model = "Group",
                "object.delete.queued"
            );
        }
        tracing::debug!(updated, "Groups marked pending deletion");

        Ok(Some(QueuedDeletion {
            transaction_id,
            group_ids: planned_ids,
        }))
    }
}

/// In-memory group table for tests.
#[derive(Default)]
pub struct MockGroupStore {
    groups: Mutex<HashMap<i64, Group>>,
}

impl MockGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, group: Group) -> Result<(), ServiceError> {
        self.lock()?.insert(group.id, group);
        Ok(())
    }

    pub fn status_of(&self, group_id: i64) -> Result<Option<GroupStatus>, ServiceError> {
        Ok(self.lock()?.get(&group_id).map(Group::status))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, Group>>, ServiceError> {
        self.groups
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock group store poisoned: {}", e)))
    }
}

#[async_trait]
impl GroupStore for MockGroupStore {
    async fn find_deletable_groups(
        &self,
        organization_id: i64,
        project_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Group>, ServiceError> {
        let groups = self.lock()?;
        Ok(group_ids
            .iter()
            .filter_map(|id| groups.get(id))
            .filter(|g| {
                g.organization_id == organization_id
                    && g.project_id == project_id
                    && !g.status().is_being_deleted()
            })
            .cloned()
            .collect())
    }

    async fn mark_pending_deletion(&self, group_ids: &[i64]) -> Result<u64, ServiceError> {
        let mut groups = self.lock()?;
        let mut updated = 0;
        for id in group_ids {
            if let Some(group) = groups.get_mut(id) {
                if !group.status().is_being_deleted() {
                    group.status_code = GroupStatus::PendingDeletion.as_str().to_string();
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}
