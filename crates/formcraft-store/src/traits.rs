//! Repository traits.
//!
//! Every tenant-scoped method takes the tenant id explicitly. Implementations
//! must never return rows of another tenant, whatever ids the caller passes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use formcraft_core::{
    ExportJob, Form, FormStatus, FormTemplate, FormTheme, Page, PageRequest, ShortLink, Submission,
    Role, TemplateCategory, Tenant, ToolRegistryEntry, User,
};

use crate::error::Result;

/// Filters for listing forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFilter {
    pub status: Option<FormStatus>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
}

impl FormFilter {
    /// Whether `form` passes the filter. Deleted forms never do.
    pub fn matches(&self, form: &Form) -> bool {
        if form.deleted_at.is_some() {
            return false;
        }
        if let Some(status) = self.status {
            if form.status != status {
                return false;
            }
        }
        match &self.search {
            Some(search) => form.title.to_lowercase().contains(&search.to_lowercase()),
            None => true,
        }
    }
}

/// Whether writing `user` drops the last of `active_owners`, the ids of the
/// tenant's currently active owners.
pub(crate) fn removes_last_owner(active_owners: &[Uuid], user: &User) -> bool {
    let stays_owner = user.role == Role::Owner && user.is_active;
    !stays_owner && active_owners.contains(&user.id) && active_owners.iter().all(|id| *id == user.id)
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Insert a tenant together with its first owner, atomically.
    async fn create_tenant_with_owner(&self, tenant: &Tenant, owner: &User) -> Result<()>;

    async fn get_tenant(&self, id: Uuid) -> Result<Tenant>;

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;

    /// Persist name, plan, feature overrides, and isolation settings.
    async fn update_tenant(&self, tenant: &Tenant) -> Result<Tenant>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, tenant_id: Uuid, id: Uuid) -> Result<User>;

    /// Lookup by normalized email.
    async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>>;

    async fn list_users(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<User>>;

    /// Persist name, role, active flag, and password hash.
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Like `update_user`, but fails with [`StoreError::LastOwner`](crate::StoreError::LastOwner) when the
    /// write would demote or deactivate the tenant's last active owner. The
    /// owner check and the write share one transaction.
    async fn update_user_keeping_owner(&self, user: &User) -> Result<()>;

    async fn count_active_owners(&self, tenant_id: Uuid) -> Result<u64>;

    async fn record_login(&self, tenant_id: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait FormRepository: Send + Sync {
    async fn create_form(&self, form: &Form) -> Result<()>;

    /// Fetch a non-deleted form.
    async fn get_form(&self, tenant_id: Uuid, id: Uuid) -> Result<Form>;

    /// Fetch a published, non-deleted form by slug.
    async fn find_published_form(&self, tenant_id: Uuid, slug: &str) -> Result<Option<Form>>;

    /// Non-deleted forms, newest first.
    async fn list_forms(&self, tenant_id: Uuid, filter: &FormFilter, page: PageRequest) -> Result<Page<Form>>;

    async fn update_form(&self, form: &Form) -> Result<()>;

    async fn soft_delete_form(&self, tenant_id: Uuid, id: Uuid) -> Result<()>;

    /// Whether a non-deleted form uses `slug`.
    async fn form_slug_exists(&self, tenant_id: Uuid, slug: &str) -> Result<bool>;

    /// Number of non-deleted forms.
    async fn count_forms(&self, tenant_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn create_submission(&self, submission: &Submission) -> Result<()>;

    /// Submissions of a form, newest first.
    async fn list_submissions(&self, tenant_id: Uuid, form_id: Uuid, page: PageRequest) -> Result<Page<Submission>>;

    async fn count_submissions(&self, tenant_id: Uuid, form_id: Uuid) -> Result<u64>;

    /// Submissions received at or after `since`, oldest first.
    async fn submissions_since(&self, tenant_id: Uuid, form_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Submission>>;
}

#[async_trait]
pub trait ThemeRepository: Send + Sync {
    /// Insert; a default theme clears the tenant's previous default.
    async fn create_theme(&self, theme: &FormTheme) -> Result<()>;

    async fn get_theme(&self, tenant_id: Uuid, id: Uuid) -> Result<FormTheme>;

    async fn list_themes(&self, tenant_id: Uuid) -> Result<Vec<FormTheme>>;

    /// Update; a default theme clears the tenant's previous default.
    async fn update_theme(&self, theme: &FormTheme) -> Result<()>;

    async fn delete_theme(&self, tenant_id: Uuid, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create_template(&self, template: &FormTemplate) -> Result<()>;

    /// Fetch a system template or one of the tenant's own.
    async fn get_template(&self, tenant_id: Uuid, id: Uuid) -> Result<FormTemplate>;

    /// System templates plus the tenant's own, by name.
    async fn list_templates(&self, tenant_id: Uuid, category: Option<TemplateCategory>) -> Result<Vec<FormTemplate>>;

    /// Insert a system template unless one with the same name exists.
    /// Returns whether a row was inserted.
    async fn insert_system_template(&self, template: &FormTemplate) -> Result<bool>;
}

#[async_trait]
pub trait ToolRepository: Send + Sync {
    async fn create_tool(&self, tool: &ToolRegistryEntry) -> Result<()>;

    async fn get_tool(&self, tenant_id: Uuid, id: Uuid) -> Result<ToolRegistryEntry>;

    async fn list_tools(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<ToolRegistryEntry>>;

    async fn update_tool(&self, tool: &ToolRegistryEntry) -> Result<()>;

    async fn delete_tool(&self, tenant_id: Uuid, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ExportRepository: Send + Sync {
    async fn create_export(&self, job: &ExportJob) -> Result<()>;

    async fn get_export(&self, tenant_id: Uuid, id: Uuid) -> Result<ExportJob>;

    /// Jobs newest first, optionally for one tool.
    async fn list_exports(&self, tenant_id: Uuid, tool_id: Option<Uuid>, page: PageRequest) -> Result<Page<ExportJob>>;

    /// Persist status, progress, and result fields.
    ///
    /// Fails with [`StoreError::Finished`] once the stored job is completed,
    /// failed, or cancelled.
    async fn update_export(&self, job: &ExportJob) -> Result<()>;
}

#[async_trait]
pub trait ShortLinkRepository: Send + Sync {
    async fn create_link(&self, link: &ShortLink) -> Result<()>;

    async fn list_links(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<ShortLink>>;

    async fn delete_link(&self, tenant_id: Uuid, id: Uuid) -> Result<()>;

    /// Global lookup by code, for the public redirect.
    async fn resolve_link(&self, code: &str) -> Result<Option<ShortLink>>;

    async fn record_click(&self, id: Uuid) -> Result<()>;
}

/// Every repository behind one handle.
#[async_trait]
pub trait Store:
    TenantRepository
    + UserRepository
    + FormRepository
    + SubmissionRepository
    + ThemeRepository
    + TemplateRepository
    + ToolRepository
    + ExportRepository
    + ShortLinkRepository
    + Send
    + Sync
    + 'static
{
    /// Cheap liveness check.
    async fn ping(&self) -> Result<()>;

    /// Backend name for health output.
    fn backend(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcraft_core::FormSchema;

    #[test]
    fn test_form_filter() {
        let mut form = Form::new(Uuid::new_v4(), Uuid::new_v4(), "Customer Survey", "survey", FormSchema::default());
        let filter = FormFilter {
            status: Some(FormStatus::Draft),
            search: Some("SURVEY".into()),
        };
        assert!(filter.matches(&form));

        form.status = FormStatus::Published;
        assert!(!filter.matches(&form));
        assert!(FormFilter::default().matches(&form));

        form.deleted_at = Some(Utc::now());
        assert!(!FormFilter::default().matches(&form));
    }

    #[test]
    fn test_removes_last_owner() {
        let tenant_id = Uuid::new_v4();
        let mut owner = User::new(tenant_id, "a@acme.io", "A", Role::Owner, "hash");
        let other = Uuid::new_v4();

        assert!(!removes_last_owner(&[owner.id], &owner));
        owner.role = Role::Admin;
        assert!(removes_last_owner(&[owner.id], &owner));
        assert!(!removes_last_owner(&[owner.id, other], &owner));

        owner.role = Role::Owner;
        owner.is_active = false;
        assert!(removes_last_owner(&[owner.id], &owner));
        // Not an owner before the write.
        assert!(!removes_last_owner(&[other], &owner));
    }
}
