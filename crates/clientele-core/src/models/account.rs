//! Account domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Role granted to the first account of every tenant.
pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_MANAGER: &str = "Manager";
pub const ROLE_USER: &str = "User";

/// Role names the system knows about.
pub const KNOWN_ROLES: [&str; 3] = [ROLE_ADMIN, ROLE_MANAGER, ROLE_USER];

/// A login-capable identity. Emails are unique across all tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email_confirmed: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccount {
    pub tenant_id: Uuid,
    pub email: String,
    /// Already-hashed credential; repositories never see plaintext.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
}

impl CreateAccount {
    /// Every role must be one of [`KNOWN_ROLES`].
    pub fn validate(&self) -> CoreResult<()> {
        match self.roles.iter().find(|r| !KNOWN_ROLES.contains(&r.as_str())) {
            Some(unknown) => Err(CoreError::validation(format!("unknown role '{unknown}'"))),
            None => Ok(()),
        }
    }
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
