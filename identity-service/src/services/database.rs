//! PostgreSQL database service for identity-service.

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool};

use crate::models::{
    GlobalIdentity, Group, GroupStatus, IdentityCategory, OrgIdentity, ResolvedIdentity,
    SocialIdentity, UserAuthState,
};
use crate::services::{GroupStore, IdentitySnapshot, IdentityStore, ServiceError};

const USER_AUTH_STATE_SQL: &str = r#"
    SELECT user_id,
           (password_hash IS NOT NULL AND password_hash <> '' AND password_hash NOT LIKE '!%')
               AS has_usable_password
    FROM users
    WHERE user_id = $1
"#;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn read_identities(
        conn: &mut PgConnection,
        user: UserAuthState,
    ) -> Result<IdentitySnapshot, ServiceError> {
        let mut snapshot = IdentitySnapshot::new(user);

        snapshot.social = sqlx::query_as::<_, SocialIdentity>(
            r#"
            SELECT social_identity_id AS id, user_id, provider, uid, date_added
            FROM social_identities
            WHERE user_id = $1
            ORDER BY social_identity_id
            "#,
        )
        .bind(user.user_id)
        .fetch_all(&mut *conn)
        .await?;

        snapshot.global = sqlx::query_as::<_, GlobalIdentity>(
            r#"
            SELECT global_identity_id AS id, user_id, provider, external_id, date_added
            FROM global_identities
            WHERE user_id = $1
            ORDER BY global_identity_id
            "#,
        )
        .bind(user.user_id)
        .fetch_all(&mut *conn)
        .await?;

        snapshot.org = sqlx::query_as::<_, OrgIdentity>(
            r#"
            SELECT ai.auth_identity_id AS id,
                   ai.user_id,
                   o.organization_id,
                   o.slug AS organization_slug,
                   o.name AS organization_name,
                   ap.provider,
                   ai.ident,
                   ap.allow_unlinked,
                   ai.date_added,
                   ai.last_verified
            FROM auth_identities ai
            JOIN auth_providers ap ON ap.auth_provider_id = ai.auth_provider_id
            JOIN organizations o ON o.organization_id = ap.organization_id
            WHERE ai.user_id = $1
            ORDER BY ai.auth_identity_id
            "#,
        )
        .bind(user.user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(snapshot)
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn load_snapshot(&self, user_id: i64) -> Result<Option<IdentitySnapshot>, ServiceError> {
        let mut conn = self.pool.acquire().await?;

        let user = sqlx::query_as::<_, UserAuthState>(USER_AUTH_STATE_SQL)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

        match user {
            Some(user) => Ok(Some(Self::read_identities(&mut conn, user).await?)),
            None => Ok(None),
        }
    }

    async fn disconnect_identity(
        &self,
        user_id: i64,
        category: IdentityCategory,
        identity_id: i64,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the user serialises concurrent disconnects for the same account.
        let locked_sql = format!("{} FOR UPDATE", USER_AUTH_STATE_SQL.trim_end());
        let user = sqlx::query_as::<_, UserAuthState>(&locked_sql)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::IdentityNotFound)?;

        let snapshot = Self::read_identities(&mut tx, user).await?;
        let resolved = snapshot.authorize_disconnect(category, identity_id)?;

        let delete_sql = match category {
            IdentityCategory::SocialIdentity => {
                "DELETE FROM social_identities WHERE social_identity_id = $1 AND user_id = $2"
            }
            IdentityCategory::GlobalIdentity => {
                "DELETE FROM global_identities WHERE global_identity_id = $1 AND user_id = $2"
            }
            IdentityCategory::OrgIdentity => {
                "DELETE FROM auth_identities WHERE auth_identity_id = $1 AND user_id = $2"
            }
        };

        sqlx::query(delete_sql)
            .bind(identity_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(resolved)
    }

    async fn find_member_id(
        &self,
        organization_id: i64,
        user_id: i64,
    ) -> Result<Option<i64>, ServiceError> {
        let member_id = sqlx::query_scalar::<_, i64>(
            "SELECT member_id FROM organization_members WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member_id)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl GroupStore for Database {
    async fn find_deletable_groups(
        &self,
        organization_id: i64,
        project_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Group>, ServiceError> {
        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.group_id AS id, g.project_id, p.organization_id, g.status_code, g.times_seen
            FROM groups g
            JOIN projects p ON p.project_id = g.project_id
            WHERE g.project_id = $1
              AND p.organization_id = $2
              AND g.group_id = ANY($3)
              AND g.status_code <> ALL($4)
            "#,
        )
        .bind(project_id)
        .bind(organization_id)
        .bind(group_ids)
        .bind(vec![
            GroupStatus::PendingDeletion.as_str(),
            GroupStatus::DeletionInProgress.as_str(),
        ])
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    async fn mark_pending_deletion(&self, group_ids: &[i64]) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE groups
            SET status_code = $1
            WHERE group_id = ANY($2)
              AND status_code <> ALL($3)
            "#,
        )
        .bind(GroupStatus::PendingDeletion.as_str())
        .bind(group_ids)
        .bind(vec![
            GroupStatus::PendingDeletion.as_str(),
            GroupStatus::DeletionInProgress.as_str(),
        ])
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
