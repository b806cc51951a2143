use serde::{Deserialize, Serialize};

use crate::catalog::User;
use crate::policy::{Identity, UserId};

/// Who a token was issued to. Admin status is deliberately not cached here; it is
/// read from the stored user whenever a request identity is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
}

impl Principal {
    pub fn for_user(user: &User) -> Self {
        Self { user_id: user.id, username: user.username.clone() }
    }
}

/// Request identity for a stored user. Inactive accounts act as anonymous.
pub fn identity_for(user: &User) -> Identity {
    if !user.is_active { return Identity::Anonymous; }
    Identity::User { id: user.id, is_admin: user.is_admin }
}
