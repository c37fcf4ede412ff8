use catalogsync_core::UserId;
use catalogsync_infra::jobs::Principal;

pub const ADMIN_ROLE: &str = "admin";

/// Authenticated caller for a request (identity + roles).
///
/// Inserted by the auth middleware; every batch route requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<String>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<String>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            is_admin: self.is_admin(),
        }
    }
}
