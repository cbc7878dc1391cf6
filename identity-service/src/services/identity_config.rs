use std::sync::Arc;

use crate::models::{IdentityCategory, ResolvedIdentity};
use crate::services::{metrics, IdentityStore, ServiceError};

/// Read and disconnect a user's linked identities.
#[derive(Clone)]
pub struct IdentityConfigService {
    store: Arc<dyn IdentityStore>,
}

impl IdentityConfigService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// All of the user's identities with freshly computed statuses.
    pub async fn get_identities(&self, user_id: i64) -> Result<Vec<ResolvedIdentity>, ServiceError> {
        let snapshot = self
            .store
            .load_snapshot(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        Ok(snapshot.resolve().collect())
    }

    /// One identity of the user, or `IdentityNotFound`.
    pub async fn get_identity(
        &self,
        user_id: i64,
        category: IdentityCategory,
        identity_id: i64,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let snapshot = self
            .store
            .load_snapshot(user_id)
            .await?
            .ok_or(ServiceError::IdentityNotFound)?;
        snapshot
            .find(category, identity_id)
            .ok_or(ServiceError::IdentityNotFound)
    }

    #[tracing::instrument(skip(self))]
    pub async fn disconnect_identity(
        &self,
        user_id: i64,
        category: IdentityCategory,
        identity_id: i64,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let result = self
            .store
            .disconnect_identity(user_id, category, identity_id)
            .await;

        let outcome = match &result {
            Ok(_) => "deleted",
            Err(ServiceError::IdentityNotFound) => "not_found",
            Err(ServiceError::DisconnectNotAllowed(_)) => "not_allowed",
            Err(_) => "error",
        };
        metrics::record_identity_disconnect(category.as_str(), outcome);

        match &result {
            Ok(_) => tracing::info!("Identity disconnected"),
            Err(ServiceError::DisconnectNotAllowed(status)) => {
                tracing::info!(status = status.as_str(), "Identity disconnect refused")
            }
            Err(_) => {}
        }

        result
    }
}
