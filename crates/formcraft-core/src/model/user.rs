//! Tenant-scoped users and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    /// Role of a user inside its tenant.
    pub enum Role: "role" {
        /// Full control, including granting ownership.
        Owner => "owner",
        /// Manages tenant settings, users, and every form.
        Admin => "admin",
        /// Builds forms and edits the ones they own.
        Editor => "editor",
        /// Read-only access.
        Viewer => "viewer",
    }
}

impl Role {
    /// Privilege rank; higher outranks lower.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 3,
            Role::Admin => 2,
            Role::Editor => 1,
            Role::Viewer => 0,
        }
    }

    /// Whether this role is at least as privileged as `other`.
    pub fn at_least(&self, other: Role) -> bool {
        self.rank() >= other.rank()
    }
}

/// Lowercase and trim an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user account. Carries the credential hash; never serialize it to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an active user. The email is normalized.
    pub fn new(
        tenant_id: Uuid,
        email: &str,
        name: impl Into<String>,
        role: Role,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            email: normalize_email(email),
            name: name.into(),
            role,
            password_hash: password_hash.into(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public view without the credential hash.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            tenant_id: self.tenant_id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }
}

/// User as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_rank() {
        assert!(Role::Owner.at_least(Role::Admin));
        assert!(Role::Editor.at_least(Role::Editor));
        assert!(!Role::Viewer.at_least(Role::Editor));
    }

    #[test]
    fn test_email_normalized() {
        let user = User::new(Uuid::new_v4(), "  Ada@Example.COM ", "Ada", Role::Owner, "hash");
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_profile_omits_hash() {
        let user = User::new(Uuid::new_v4(), "a@b.co", "A", Role::Viewer, "secret-hash");
        let json = serde_json::to_string(&user.profile()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"viewer\""));
    }
}
