pub mod group;
pub mod identity;
pub mod user;
pub mod verification;

pub use group::{Group, GroupStatus};
pub use identity::{
    GlobalIdentity, IdentityCategory, IdentityRecord, IdentityResponse, IdentityStatus,
    OrgIdentity, OrganizationSummary, ProviderResponse, ResolvedIdentity, SocialIdentity,
};
pub use user::UserAuthState;
pub use verification::VerificationRecord;
