use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payload stored behind a one-time IdP migration key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub user_id: i64,
    pub email: String,
    pub member_id: i64,
    pub identity_id: String,
}

impl VerificationRecord {
    /// Field/value pairs as written to the cache hash.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("user_id", self.user_id.to_string()),
            ("email", self.email.clone()),
            ("member_id", self.member_id.to_string()),
            ("identity_id", self.identity_id.clone()),
        ]
    }

    /// Rebuild a record from a cache hash; `None` if any field is missing or malformed.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            user_id: fields.get("user_id")?.parse().ok()?,
            email: fields.get("email")?.clone(),
            member_id: fields.get("member_id")?.parse().ok()?,
            identity_id: fields.get("identity_id")?.clone(),
        })
    }
}
