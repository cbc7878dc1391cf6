//! Services layer for identity-service.
//!
//! Identity status resolution, guarded disconnects, IdP migration
//! verification keys and issue-group helpers, plus the stores they run on.

mod database;
mod email;
pub mod error;
pub mod group;
mod identity_config;
pub mod identity_status;
mod identity_store;
pub mod idp_migration;
pub mod issue_query;
mod jwt;
pub mod metrics;
pub mod redis;

pub use database::Database;
pub use email::{EmailProvider, EmailService, MockEmailService, SentEmail};
pub use error::ServiceError;
pub use group::{GroupService, GroupStore, MockGroupStore, QueuedDeletion};
pub use identity_config::IdentityConfigService;
pub use identity_status::IdentitySnapshot;
pub use identity_store::{IdentityStore, MockIdentityStore};
pub use idp_migration::IdpMigrationService;
pub use issue_query::{Cursor, IssueQueryParams, StatsPeriod};
pub use jwt::{AccessTokenClaims, JwtValidator};
pub use redis::{KeyValueStore, MockKeyValueStore, RedisService};
