//! One-time verification keys for identity-provider migration.
//!
//! When an organization switches identity providers, its members' SSO
//! identities are removed. A member re-links by confirming their email: we
//! store a random key in the cache for ten minutes and mail them a link that
//! carries it.
//!
//! Verifying a key does not consume it. A key stays valid for its whole TTL
//! and can be checked more than once.

use rand::{distributions::Alphanumeric, Rng};
use std::sync::Arc;

use crate::models::VerificationRecord;
use crate::services::{metrics, EmailProvider, IdentityStore, KeyValueStore, ServiceError};

pub const ONE_TIME_KEY_PREFIX: &str = "auth:one-time-key:";
pub const VERIFICATION_TTL_SECONDS: u64 = 10 * 60;
pub const VERIFICATION_CODE_LENGTH: usize = 32;

/// Cache key under which a verification code's record is stored.
pub fn one_time_key(code: &str) -> String {
    format!("{}{}", ONE_TIME_KEY_PREFIX, code)
}

/// Random code over `[A-Za-z0-9]`.
pub fn generate_verification_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFICATION_CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Whether `code` could have been produced by [`generate_verification_code`].
pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == VERIFICATION_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[derive(Clone)]
pub struct IdpMigrationService {
    identities: Arc<dyn IdentityStore>,
    cache: Arc<dyn KeyValueStore>,
    email: Arc<dyn EmailProvider>,
    public_base_url: String,
}

impl IdpMigrationService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        cache: Arc<dyn KeyValueStore>,
        email: Arc<dyn EmailProvider>,
        public_base_url: String,
    ) -> Self {
        Self {
            identities,
            cache,
            email,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn verification_url(&self, code: &str) -> String {
        format!("{}/auth/idp-migration/verify/{}", self.public_base_url, code)
    }

    /// Store and email a one-time verification key for `user_id` in `organization_id`.
    ///
    /// Fails with [`ServiceError::MembershipNotFound`] when the user is not a
    /// member of the organization; nothing is stored or sent in that case.
    #[tracing::instrument(skip(self, email, identity_id))]
    pub async fn send_one_time_account_confirm_link(
        &self,
        user_id: i64,
        organization_id: i64,
        email: &str,
        identity_id: &str,
    ) -> Result<String, ServiceError> {
        let member_id = self
            .identities
            .find_member_id(organization_id, user_id)
            .await?
            .ok_or(ServiceError::MembershipNotFound)?;

        // No collision check: 62^32 codes make a clash negligible.
        let code = generate_verification_code();
        let record = VerificationRecord {
            user_id,
            email: email.to_string(),
            member_id,
            identity_id: identity_id.to_string(),
        };

        let key = one_time_key(&code);
        self.cache
            .set_hash_with_ttl(&key, &record.to_fields(), VERIFICATION_TTL_SECONDS)
            .await?;

        if let Err(e) = self
            .email
            .send_idp_verification_email(email, &self.verification_url(&code))
            .await
        {
            tracing::error!(error = %e, member_id, "Failed to send IdP migration email");
            // A key nobody received must not stay live.
            if let Err(cleanup) = self.cache.delete(&key).await {
                tracing::error!(error = %cleanup, "Failed to remove undelivered verification key");
            }
            return Err(ServiceError::EmailError(e.to_string()));
        }

        tracing::info!(member_id, "IdP migration verification key issued");

        Ok(code)
    }

    /// Whether `code` names a live verification key.
    ///
    /// Malformed, expired and never-issued codes all return `false`.
    pub async fn verify_account(&self, code: &str) -> Result<bool, ServiceError> {
        let valid = self.get_verification(code).await?.is_some();
        metrics::record_idp_verification(valid);
        Ok(valid)
    }

    /// The record stored for `code`, if the key is still live.
    pub async fn get_verification(
        &self,
        code: &str,
    ) -> Result<Option<VerificationRecord>, ServiceError> {
        if !is_well_formed_code(code) {
            return Ok(None);
        }

        let fields = self.cache.get_hash(&one_time_key(code)).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        match VerificationRecord::from_fields(&fields) {
            Some(record) => Ok(Some(record)),
            None => {
                tracing::warn!("Verification key holds an incomplete record");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserAuthState;
    use crate::services::{MockEmailService, MockIdentityStore, MockKeyValueStore};

    const USER_ID: i64 = 11;
    const ORG_ID: i64 = 500;

    struct Fixture {
        service: IdpMigrationService,
        identities: Arc<MockIdentityStore>,
        cache: Arc<MockKeyValueStore>,
        email: Arc<MockEmailService>,
    }

    fn fixture() -> Fixture {
        let identities = Arc::new(MockIdentityStore::new());
        identities
            .insert_user(UserAuthState::new(USER_ID, false))
            .unwrap();
        let cache = Arc::new(MockKeyValueStore::new());
        let email = Arc::new(MockEmailService::new());
        let service = IdpMigrationService::new(
            identities.clone(),
            cache.clone(),
            email.clone(),
            "https://id.example.com/".to_string(),
        );
        Fixture {
            service,
            identities,
            cache,
            email,
        }
    }

    #[test]
    fn generated_codes_are_32_alphanumerics() {
        for _ in 0..50 {
            let code = generate_verification_code();
            assert!(is_well_formed_code(&code), "bad code {}", code);
        }
        assert_ne!(generate_verification_code(), generate_verification_code());
    }

    #[test]
    fn well_formed_rejects_wrong_length_and_symbols() {
        assert!(!is_well_formed_code(""));
        assert!(!is_well_formed_code("abc"));
        assert!(!is_well_formed_code(&"a".repeat(33)));
        assert!(!is_well_formed_code(&format!("{}-", "a".repeat(31))));
        assert!(is_well_formed_code(&"aZ9x".repeat(8)));
    }

    #[tokio::test(start_paused = true)]
    async fn issue_stores_record_and_sends_link() {
        let f = fixture();
        let member_id = f.identities.add_membership(ORG_ID, USER_ID).unwrap();

        let code = f
            .service
            .send_one_time_account_confirm_link(USER_ID, ORG_ID, "jane@example.com", "okta|42")
            .await
            .unwrap();

        let stored = f.service.get_verification(&code).await.unwrap().unwrap();
        assert_eq!(
            stored,
            VerificationRecord {
                user_id: USER_ID,
                email: "jane@example.com".to_string(),
                member_id,
                identity_id: "okta|42".to_string(),
            }
        );
        assert_eq!(
            f.cache.ttl(&one_time_key(&code)).unwrap(),
            Some(VERIFICATION_TTL_SECONDS)
        );

        let sent = f.email.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@example.com");
        assert_eq!(
            sent[0].verification_url,
            format!("https://id.example.com/auth/idp-migration/verify/{}", code)
        );
    }

    #[tokio::test]
    async fn issue_without_membership_stores_nothing() {
        let f = fixture();

        let result = f
            .service
            .send_one_time_account_confirm_link(USER_ID, ORG_ID, "jane@example.com", "okta|42")
            .await;

        assert!(matches!(result, Err(ServiceError::MembershipNotFound)));
        assert!(f.cache.live_keys().unwrap().is_empty());
        assert!(f.email.sent().is_empty());
    }

    #[tokio::test]
    async fn verify_is_repeatable_within_ttl() {
        let f = fixture();
        f.identities.add_membership(ORG_ID, USER_ID).unwrap();
        let code = f
            .service
            .send_one_time_account_confirm_link(USER_ID, ORG_ID, "jane@example.com", "okta|42")
            .await
            .unwrap();

        assert!(f.service.verify_account(&code).await.unwrap());
        assert!(f.service.verify_account(&code).await.unwrap());
    }

    #[tokio::test]
    async fn verify_rejects_unknown_and_malformed_codes() {
        let f = fixture();

        assert!(!f
            .service
            .verify_account(&generate_verification_code())
            .await
            .unwrap());
        assert!(!f.service.verify_account("not a code").await.unwrap());
        assert!(!f.service.verify_account("").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn verify_fails_after_ttl() {
        let f = fixture();
        f.identities.add_membership(ORG_ID, USER_ID).unwrap();
        let code = f
            .service
            .send_one_time_account_confirm_link(USER_ID, ORG_ID, "jane@example.com", "okta|42")
            .await
            .unwrap();

        tokio::time::advance(std::time::Duration::from_secs(VERIFICATION_TTL_SECONDS - 1)).await;
        assert!(f.service.verify_account(&code).await.unwrap());

        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        assert!(!f.service.verify_account(&code).await.unwrap());
    }

    struct UnreachableMailer;

    #[async_trait::async_trait]
    impl EmailProvider for UnreachableMailer {
        async fn send_idp_verification_email(
            &self,
            _to_email: &str,
            _verification_url: &str,
        ) -> Result<(), service_core::error::AppError> {
            Err(service_core::error::AppError::EmailError(
                "connection refused".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn undelivered_key_is_removed() {
        let identities = Arc::new(MockIdentityStore::new());
        identities
            .insert_user(UserAuthState::new(USER_ID, false))
            .unwrap();
        identities.add_membership(ORG_ID, USER_ID).unwrap();
        let cache = Arc::new(MockKeyValueStore::new());
        let service = IdpMigrationService::new(
            identities,
            cache.clone(),
            Arc::new(UnreachableMailer),
            "https://id.example.com".to_string(),
        );

        let result = service
            .send_one_time_account_confirm_link(USER_ID, ORG_ID, "jane@example.com", "okta|42")
            .await;

        assert!(matches!(result, Err(ServiceError::EmailError(_))));
        assert!(cache.live_keys().unwrap().is_empty());
    }
}
