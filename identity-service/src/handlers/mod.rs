//! HTTP handlers for identity-service.

pub mod identity;
pub mod idp_migration;
pub mod issues;
pub mod metrics;

pub use identity::*;
pub use idp_migration::*;
pub use issues::*;
