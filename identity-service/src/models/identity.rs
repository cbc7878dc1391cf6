//! Identity models - the three kinds of external login linked to a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;

/// Kind of linked identity; also the path segment used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityCategory {
    /// Legacy social-auth association.
    SocialIdentity,
    /// Login identity not bound to any organization.
    GlobalIdentity,
    /// SSO identity bound to one organization's auth provider.
    OrgIdentity,
}

impl IdentityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityCategory::SocialIdentity => "social-identity",
            IdentityCategory::GlobalIdentity => "global-identity",
            IdentityCategory::OrgIdentity => "org-identity",
        }
    }
}

impl std::str::FromStr for IdentityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "social-identity" => Ok(IdentityCategory::SocialIdentity),
            "global-identity" => Ok(IdentityCategory::GlobalIdentity),
            "org-identity" => Ok(IdentityCategory::OrgIdentity),
            _ => Err(format!("Invalid identity category: {}", s)),
        }
    }
}

impl fmt::Display for IdentityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an identity may be disconnected right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    CanDisconnect,
    NeededForGlobalAuth,
    NeededForOrgAuth,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStatus::CanDisconnect => "can_disconnect",
            IdentityStatus::NeededForGlobalAuth => "needed_for_global_auth",
            IdentityStatus::NeededForOrgAuth => "needed_for_org_auth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SocialIdentity {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub uid: String,
    pub date_added: DateTime<Utc>,
}

impl SocialIdentity {
    pub fn new(id: i64, user_id: i64, provider: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            id,
            user_id,
            provider: provider.into(),
            uid: uid.into(),
            date_added: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GlobalIdentity {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub external_id: String,
    pub date_added: DateTime<Utc>,
}

impl GlobalIdentity {
    pub fn new(
        id: i64,
        user_id: i64,
        provider: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_id,
            provider: provider.into(),
            external_id: external_id.into(),
            date_added: Utc::now(),
        }
    }
}

/// Identity issued by an organization's auth provider, joined with the bits of
/// the provider and organization the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OrgIdentity {
    pub id: i64,
    pub user_id: i64,
    pub organization_id: i64,
    pub organization_slug: String,
    pub organization_name: String,
    pub provider: String,
    pub ident: String,
    /// Members may unlink from this provider; false means the org requires SSO.
    pub allow_unlinked: bool,
    pub date_added: DateTime<Utc>,
    pub last_verified: DateTime<Utc>,
}

impl OrgIdentity {
    pub fn new(
        id: i64,
        user_id: i64,
        organization_id: i64,
        organization_slug: impl Into<String>,
        provider: impl Into<String>,
        allow_unlinked: bool,
    ) -> Self {
        let organization_slug = organization_slug.into();
        let provider = provider.into();
        let now = Utc::now();
        Self {
            id,
            user_id,
            organization_id,
            organization_name: organization_slug.clone(),
            ident: format!("{}|{}", provider, user_id),
            organization_slug,
            provider,
            allow_unlinked,
            date_added: now,
            last_verified: now,
        }
    }
}

/// One linked identity of any category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRecord {
    Social(SocialIdentity),
    Global(GlobalIdentity),
    Org(OrgIdentity),
}

impl IdentityRecord {
    pub fn id(&self) -> i64 {
        match self {
            IdentityRecord::Social(i) => i.id,
            IdentityRecord::Global(i) => i.id,
            IdentityRecord::Org(i) => i.id,
        }
    }

    pub fn category(&self) -> IdentityCategory {
        match self {
            IdentityRecord::Social(_) => IdentityCategory::SocialIdentity,
            IdentityRecord::Global(_) => IdentityCategory::GlobalIdentity,
            IdentityRecord::Org(_) => IdentityCategory::OrgIdentity,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            IdentityRecord::Social(i) => &i.provider,
            IdentityRecord::Global(i) => &i.provider,
            IdentityRecord::Org(i) => &i.provider,
        }
    }

    /// The user's handle at the provider.
    pub fn name(&self) -> &str {
        match self {
            IdentityRecord::Social(i) => &i.uid,
            IdentityRecord::Global(i) => &i.external_id,
            IdentityRecord::Org(i) => &i.ident,
        }
    }

    pub fn date_added(&self) -> DateTime<Utc> {
        match self {
            IdentityRecord::Social(i) => i.date_added,
            IdentityRecord::Global(i) => i.date_added,
            IdentityRecord::Org(i) => i.date_added,
        }
    }

    /// Social associations only link data; they never log anyone in.
    pub fn is_login(&self) -> bool {
        !matches!(self, IdentityRecord::Social(_))
    }
}

/// An identity paired with its freshly computed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: IdentityRecord,
    pub status: IdentityStatus,
}

impl ResolvedIdentity {
    pub fn new(identity: IdentityRecord, status: IdentityStatus) -> Self {
        Self { identity, status }
    }

    pub fn matches(&self, category: IdentityCategory, identity_id: i64) -> bool {
        self.identity.category() == category && self.identity.id() == identity_id
    }

    pub fn to_response(&self) -> IdentityResponse {
        let identity = &self.identity;
        let (organization, date_verified) = match identity {
            IdentityRecord::Org(org) => (
                Some(OrganizationSummary {
                    id: org.organization_id,
                    slug: org.organization_slug.clone(),
                    name: org.organization_name.clone(),
                }),
                Some(org.last_verified),
            ),
            _ => (None, None),
        };

        IdentityResponse {
            id: identity.id().to_string(),
            category: identity.category(),
            status: self.status,
            provider: ProviderResponse {
                key: identity.provider().to_string(),
                name: provider_display_name(identity.provider()),
            },
            name: identity.name().to_string(),
            organization,
            is_login: identity.is_login(),
            date_added: identity.date_added(),
            date_verified,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProviderResponse {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizationSummary {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

/// Serialized identity as returned by the identity endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IdentityResponse {
    pub id: String,
    pub category: IdentityCategory,
    pub status: IdentityStatus,
    pub provider: ProviderResponse,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationSummary>,
    pub is_login: bool,
    pub date_added: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_verified: Option<DateTime<Utc>>,
}

/// Human-readable provider name; unknown keys are shown as-is.
pub fn provider_display_name(key: &str) -> String {
    match key {
        "github" => "GitHub".to_string(),
        "google" => "Google".to_string(),
        "gitlab" => "GitLab".to_string(),
        "bitbucket" => "Bitbucket".to_string(),
        "okta" => "Okta".to_string(),
        "saml2" => "SAML2".to_string(),
        "azure-ad" | "azure_ad" => "Azure AD".to_string(),
        "jumpcloud" => "JumpCloud".to_string(),
        other => other.to_string(),
    }
}
