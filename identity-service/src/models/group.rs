//! Issue group model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Lifecycle state of an issue group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Unresolved,
    Resolved,
    Ignored,
    PendingDeletion,
    DeletionInProgress,
    PendingMerge,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Unresolved => "unresolved",
            GroupStatus::Resolved => "resolved",
            GroupStatus::Ignored => "ignored",
            GroupStatus::PendingDeletion => "pending_deletion",
            GroupStatus::DeletionInProgress => "deletion_in_progress",
            GroupStatus::PendingMerge => "pending_merge",
        }
    }

    /// Already handed to the deletion pipeline.
    pub fn is_being_deleted(&self) -> bool {
        matches!(
            self,
            GroupStatus::PendingDeletion | GroupStatus::DeletionInProgress
        )
    }
}

impl std::str::FromStr for GroupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unresolved" => Ok(GroupStatus::Unresolved),
            "resolved" => Ok(GroupStatus::Resolved),
            "ignored" => Ok(GroupStatus::Ignored),
            "pending_deletion" => Ok(GroupStatus::PendingDeletion),
            "deletion_in_progress" => Ok(GroupStatus::DeletionInProgress),
            "pending_merge" => Ok(GroupStatus::PendingMerge),
            _ => Err(format!("Invalid group status: {}", s)),
        }
    }
}

/// Issue group entity.
#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub id: i64,
    pub project_id: i64,
    pub organization_id: i64,
    pub status_code: String,
    pub times_seen: i64,
}

impl Group {
    pub fn new(id: i64, project_id: i64, organization_id: i64, times_seen: i64) -> Self {
        Self {
            id,
            project_id,
            organization_id,
            status_code: GroupStatus::Unresolved.as_str().to_string(),
            times_seen,
        }
    }

    /// Parsed status; unknown codes are treated as unresolved.
    pub fn status(&self) -> GroupStatus {
        self.status_code.parse().unwrap_or(GroupStatus::Unresolved)
    }

    pub fn with_status(mut self, status: GroupStatus) -> Self {
        self.status_code = status.as_str().to_string();
        self
    }
}
