//! User model - the slice of account state identity decisions depend on.

use sqlx::FromRow;

/// Password state of a user account.
///
/// `has_usable_password` is false for accounts created through SSO or social
/// login that never set a password, and for passwords explicitly marked unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct UserAuthState {
    pub user_id: i64,
    pub has_usable_password: bool,
}

impl UserAuthState {
    pub fn new(user_id: i64, has_usable_password: bool) -> Self {
        Self {
            user_id,
            has_usable_password,
        }
    }
}
