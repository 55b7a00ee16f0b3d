//! Authenticated caller context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{SecurityError, SecurityResult};
use crate::model::{Role, User};

/// Identity of an authenticated caller, taken from a verified token.
///
/// Every tenant-scoped repository call is made with `tenant_id` from this
/// context, never from request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    /// Create a context.
    pub fn new(user_id: Uuid, tenant_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
        }
    }

    /// Context for a user record.
    pub fn for_user(user: &User) -> Self {
        Self::new(user.id, user.tenant_id, user.role)
    }

    /// Change tenant settings and plan features.
    pub fn can_manage_tenant(&self) -> bool {
        self.role.at_least(Role::Admin)
    }

    /// Invite, re-role, and deactivate users.
    pub fn can_manage_users(&self) -> bool {
        self.role.at_least(Role::Admin)
    }

    /// Create forms, themes, templates, and links.
    pub fn can_create_forms(&self) -> bool {
        self.role.at_least(Role::Editor)
    }

    /// Owners and admins edit any form; editors only their own.
    pub fn can_edit_form(&self, owner_id: Uuid) -> bool {
        match self.role {
            Role::Owner | Role::Admin => true,
            Role::Editor => owner_id == self.user_id,
            Role::Viewer => false,
        }
    }

    /// Read anything inside the tenant.
    pub fn can_view(&self) -> bool {
        true
    }

    /// Register tools and start exports.
    pub fn can_manage_tools(&self) -> bool {
        self.role.at_least(Role::Editor)
    }

    fn require(&self, allowed: bool, action: &str) -> SecurityResult<()> {
        if allowed {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                tenant_id = %self.tenant_id,
                role = %self.role,
                action,
                "permission denied"
            );
            Err(SecurityError::PermissionDenied(format!(
                "role {} cannot {action}",
                self.role
            )))
        }
    }

    pub fn require_manage_tenant(&self) -> SecurityResult<()> {
        self.require(self.can_manage_tenant(), "manage tenant settings")
    }

    pub fn require_manage_users(&self) -> SecurityResult<()> {
        self.require(self.can_manage_users(), "manage users")
    }

    pub fn require_create_forms(&self) -> SecurityResult<()> {
        self.require(self.can_create_forms(), "create content")
    }

    pub fn require_edit_form(&self, owner_id: Uuid) -> SecurityResult<()> {
        self.require(self.can_edit_form(owner_id), "edit this form")
    }

    pub fn require_manage_tools(&self) -> SecurityResult<()> {
        self.require(self.can_manage_tools(), "manage tools")
    }

    /// Check a role change of `target` to `new_role`.
    ///
    /// `active_owners` is the number of active owners in the tenant,
    /// including `target` if it is one.
    pub fn check_role_change(&self, target: &User, new_role: Role, active_owners: usize) -> SecurityResult<()> {
        self.require_manage_users()?;
        if target.id == self.user_id {
            return Err(SecurityError::PermissionDenied(
                "users cannot change their own role".to_string(),
            ));
        }
        let touches_owner = new_role == Role::Owner || target.role == Role::Owner;
        if touches_owner && self.role != Role::Owner {
            return Err(SecurityError::PermissionDenied(
                "only owners may grant or revoke ownership".to_string(),
            ));
        }
        if target.role == Role::Owner && new_role != Role::Owner && target.is_active && active_owners <= 1 {
            return Err(SecurityError::LastOwner);
        }
        Ok(())
    }

    /// Check deactivation of `target`.
    pub fn check_deactivation(&self, target: &User, active_owners: usize) -> SecurityResult<()> {
        self.require_manage_users()?;
        if target.id == self.user_id {
            return Err(SecurityError::PermissionDenied(
                "users cannot deactivate themselves".to_string(),
            ));
        }
        if target.role == Role::Owner {
            if self.role != Role::Owner {
                return Err(SecurityError::PermissionDenied(
                    "only owners may deactivate an owner".to_string(),
                ));
            }
            if target.is_active && active_owners <= 1 {
                return Err(SecurityError::LastOwner);
            }
        }
        Ok(())
    }

    /// Check that a new user may be created with `role`.
    pub fn check_grant(&self, role: Role) -> SecurityResult<()> {
        self.require_manage_users()?;
        if role == Role::Owner && self.role != Role::Owner {
            return Err(SecurityError::PermissionDenied(
                "only owners may grant ownership".to_string(),
            ));
        }
        Ok(())
    }
}
