//! In-memory store.
//!
//! Mirrors the PostgreSQL schema's unique, foreign-key, and cascade rules so
//! tests and local runs see the same errors. All tables sit behind one lock;
//! every call is a single critical section.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use formcraft_core::{
    normalize_email, ExportJob, Form, FormTemplate, FormTheme, Page, PageRequest, Role, ShortLink,
    Submission, TemplateCategory, Tenant, ToolRegistryEntry, User,
};

use crate::error::{conflict_message, Result, StoreError};
use crate::traits::{
    removes_last_owner, ExportRepository, FormFilter, FormRepository, ShortLinkRepository, Store, SubmissionRepository,
    TemplateRepository, TenantRepository, ThemeRepository, ToolRepository, UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    tenants: HashMap<Uuid, Tenant>,
    users: HashMap<Uuid, User>,
    forms: HashMap<Uuid, Form>,
    submissions: Vec<Submission>,
    themes: HashMap<Uuid, FormTheme>,
    templates: HashMap<Uuid, FormTemplate>,
    tools: HashMap<Uuid, ToolRegistryEntry>,
    exports: HashMap<Uuid, ExportJob>,
    links: HashMap<Uuid, ShortLink>,
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict(conflict_message(Some(constraint)))
}

fn missing(reference: &str) -> StoreError {
    StoreError::InvalidReference(reference.to_string())
}

impl Tables {
    fn require_tenant(&self, tenant_id: Uuid) -> Result<()> {
        if self.tenants.contains_key(&tenant_id) {
            Ok(())
        } else {
            Err(missing("tenant_id_fkey"))
        }
    }

    fn require_user(&self, tenant_id: Uuid, id: Uuid, reference: &str) -> Result<()> {
        match self.users.get(&id) {
            Some(user) if user.tenant_id == tenant_id => Ok(()),
            _ => Err(missing(reference)),
        }
    }

    fn require_form(&self, tenant_id: Uuid, id: Option<Uuid>, reference: &str) -> Result<()> {
        match id {
            None => Ok(()),
            Some(id) => match self.forms.get(&id) {
                Some(form) if form.tenant_id == tenant_id => Ok(()),
                _ => Err(missing(reference)),
            },
        }
    }

    fn check_user_email(&self, user: &User) -> Result<()> {
        let taken = self
            .users
            .values()
            .any(|u| u.id != user.id && u.tenant_id == user.tenant_id && u.email == user.email);
        if taken {
            return Err(conflict("users_tenant_email_key"));
        }
        Ok(())
    }

    fn write_user(&mut self, user: &User) -> Result<()> {
        self.check_user_email(user)?;
        let stored = self
            .users
            .get_mut(&user.id)
            .filter(|u| u.tenant_id == user.tenant_id)
            .ok_or(StoreError::NotFound("user"))?;
        stored.name = user.name.clone();
        stored.role = user.role;
        stored.is_active = user.is_active;
        stored.password_hash = user.password_hash.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    fn check_form_slug(&self, form: &Form) -> Result<()> {
        let taken = self.forms.values().any(|f| {
            f.id != form.id && f.tenant_id == form.tenant_id && f.deleted_at.is_none() && f.slug == form.slug
        });
        if taken {
            return Err(conflict("forms_tenant_slug_key"));
        }
        Ok(())
    }

    fn check_theme_name(&self, theme: &FormTheme) -> Result<()> {
        let taken = self
            .themes
            .values()
            .any(|t| t.id != theme.id && t.tenant_id == theme.tenant_id && t.name == theme.name);
        if taken {
            return Err(conflict("themes_tenant_name_key"));
        }
        Ok(())
    }

    fn clear_default_theme(&mut self, theme: &FormTheme) {
        if !theme.is_default {
            return;
        }
        for other in self.themes.values_mut() {
            if other.tenant_id == theme.tenant_id && other.id != theme.id {
                other.is_default = false;
            }
        }
    }

    fn check_template_name(&self, template: &FormTemplate) -> Result<()> {
        let taken = self
            .templates
            .values()
            .any(|t| t.id != template.id && t.tenant_id == template.tenant_id && t.name == template.name);
        if taken {
            return Err(conflict("templates_tenant_name_key"));
        }
        Ok(())
    }

    fn check_tool(&self, tool: &ToolRegistryEntry) -> Result<()> {
        self.require_form(tool.tenant_id, tool.form_id, "tools_form_id_fkey")?;
        let taken = self
            .tools
            .values()
            .any(|t| t.id != tool.id && t.tenant_id == tool.tenant_id && t.slug == tool.slug);
        if taken {
            return Err(conflict("tools_tenant_slug_key"));
        }
        Ok(())
    }
}

/// Repositories held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRepository for MemoryStore {
    async fn create_tenant_with_owner(&self, tenant: &Tenant, owner: &User) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.tenants.values().any(|t| t.slug == tenant.slug) {
            return Err(conflict("tenants_slug_key"));
        }
        if owner.tenant_id != tenant.id {
            return Err(missing("users_tenant_id_fkey"));
        }
        tables.tenants.insert(tenant.id, tenant.clone());
        tables.users.insert(owner.id, owner.clone());
        Ok(())
    }

    async fn get_tenant(&self, id: Uuid) -> Result<Tenant> {
        self.tables
            .read()
            .tenants
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("tenant"))
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        Ok(self.tables.read().tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn update_tenant(&self, tenant: &Tenant) -> Result<Tenant> {
        let mut tables = self.tables.write();
        let stored = tables
            .tenants
            .get_mut(&tenant.id)
            .ok_or(StoreError::NotFound("tenant"))?;
        stored.name = tenant.name.clone();
        stored.plan = tenant.plan;
        stored.features = tenant.features.clone();
        stored.isolation = tenant.isolation.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write();
        tables.require_tenant(user.tenant_id)?;
        tables.check_user_email(user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, tenant_id: Uuid, id: Uuid) -> Result<User> {
        self.tables
            .read()
            .users
            .get(&id)
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn find_user_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email == email)
            .cloned())
    }

    async fn list_users(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<User>> {
        let mut users: Vec<User> = self
            .tables
            .read()
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(users, page))
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        self.tables.write().write_user(user)
    }

    async fn update_user_keeping_owner(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write();
        let owners: Vec<Uuid> = tables
            .users
            .values()
            .filter(|u| u.tenant_id == user.tenant_id && u.role == Role::Owner && u.is_active)
            .map(|u| u.id)
            .collect();
        if removes_last_owner(&owners, user) {
            return Err(StoreError::LastOwner);
        }
        tables.write_user(user)
    }

    async fn count_active_owners(&self, tenant_id: Uuid) -> Result<u64> {
        let count = self
            .tables
            .read()
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id && u.role == Role::Owner && u.is_active)
            .count();
        Ok(count as u64)
    }

    async fn record_login(&self, tenant_id: Uuid, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .filter(|u| u.tenant_id == tenant_id)
            .ok_or(StoreError::NotFound("user"))?;
        user.last_login_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl FormRepository for MemoryStore {
    async fn create_form(&self, form: &Form) -> Result<()> {
        let mut tables = self.tables.write();
        tables.require_tenant(form.tenant_id)?;
        tables.require_user(form.tenant_id, form.owner_id, "forms_owner_id_fkey")?;
        if let Some(theme_id) = form.theme_id {
            if !tables.themes.get(&theme_id).is_some_and(|t| t.tenant_id == form.tenant_id) {
                return Err(missing("forms_theme_id_fkey"));
            }
        }
        tables.check_form_slug(form)?;
        tables.forms.insert(form.id, form.clone());
        Ok(())
    }

    async fn get_form(&self, tenant_id: Uuid, id: Uuid) -> Result<Form> {
        self.tables
            .read()
            .forms
            .get(&id)
            .filter(|f| f.tenant_id == tenant_id && f.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound("form"))
    }

    async fn find_published_form(&self, tenant_id: Uuid, slug: &str) -> Result<Option<Form>> {
        Ok(self
            .tables
            .read()
            .forms
            .values()
            .find(|f| f.tenant_id == tenant_id && f.slug == slug && f.is_live())
            .cloned())
    }

    async fn list_forms(&self, tenant_id: Uuid, filter: &FormFilter, page: PageRequest) -> Result<Page<Form>> {
        let mut forms: Vec<Form> = self
            .tables
            .read()
            .forms
            .values()
            .filter(|f| f.tenant_id == tenant_id && filter.matches(f))
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(forms, page))
    }

    async fn update_form(&self, form: &Form) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(theme_id) = form.theme_id {
            if !tables.themes.get(&theme_id).is_some_and(|t| t.tenant_id == form.tenant_id) {
                return Err(missing("forms_theme_id_fkey"));
            }
        }
        tables.check_form_slug(form)?;
        let stored = tables
            .forms
            .get_mut(&form.id)
            .filter(|f| f.tenant_id == form.tenant_id && f.deleted_at.is_none())
            .ok_or(StoreError::NotFound("form"))?;
        stored.title = form.title.clone();
        stored.description = form.description.clone();
        stored.slug = form.slug.clone();
        stored.status = form.status;
        stored.schema = form.schema.clone();
        stored.theme_id = form.theme_id;
        stored.published_at = form.published_at;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn soft_delete_form(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        let form = tables
            .forms
            .get_mut(&id)
            .filter(|f| f.tenant_id == tenant_id && f.deleted_at.is_none())
            .ok_or(StoreError::NotFound("form"))?;
        form.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn form_slug_exists(&self, tenant_id: Uuid, slug: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .forms
            .values()
            .any(|f| f.tenant_id == tenant_id && f.deleted_at.is_none() && f.slug == slug))
    }

    async fn count_forms(&self, tenant_id: Uuid) -> Result<u64> {
        let count = self
            .tables
            .read()
            .forms
            .values()
            .filter(|f| f.tenant_id == tenant_id && f.deleted_at.is_none())
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl SubmissionRepository for MemoryStore {
    async fn create_submission(&self, submission: &Submission) -> Result<()> {
        let mut tables = self.tables.write();
        tables.require_form(submission.tenant_id, Some(submission.form_id), "submissions_form_id_fkey")?;
        tables.submissions.push(submission.clone());
        Ok(())
    }

    async fn list_submissions(&self, tenant_id: Uuid, form_id: Uuid, page: PageRequest) -> Result<Page<Submission>> {
        let mut items: Vec<Submission> = self
            .tables
            .read()
            .submissions
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.form_id == form_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(items, page))
    }

    async fn count_submissions(&self, tenant_id: Uuid, form_id: Uuid) -> Result<u64> {
        let count = self
            .tables
            .read()
            .submissions
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.form_id == form_id)
            .count();
        Ok(count as u64)
    }

    async fn submissions_since(&self, tenant_id: Uuid, form_id: Uuid, since: DateTime<Utc>) -> Result<Vec<Submission>> {
        let mut items: Vec<Submission> = self
            .tables
            .read()
            .submissions
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.form_id == form_id && s.submitted_at >= since)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }
}

#[async_trait]
impl ThemeRepository for MemoryStore {
    async fn create_theme(&self, theme: &FormTheme) -> Result<()> {
        let mut tables = self.tables.write();
        tables.require_tenant(theme.tenant_id)?;
        tables.check_theme_name(theme)?;
        tables.clear_default_theme(theme);
        tables.themes.insert(theme.id, theme.clone());
        Ok(())
    }

    async fn get_theme(&self, tenant_id: Uuid, id: Uuid) -> Result<FormTheme> {
        self.tables
            .read()
            .themes
            .get(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .ok_or(StoreError::NotFound("theme"))
    }

    async fn list_themes(&self, tenant_id: Uuid) -> Result<Vec<FormTheme>> {
        let mut themes: Vec<FormTheme> = self
            .tables
            .read()
            .themes
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect();
        themes.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| a.name.cmp(&b.name)));
        Ok(themes)
    }

    async fn update_theme(&self, theme: &FormTheme) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.themes.get(&theme.id).is_some_and(|t| t.tenant_id == theme.tenant_id) {
            return Err(StoreError::NotFound("theme"));
        }
        tables.check_theme_name(theme)?;
        tables.clear_default_theme(theme);
        if let Some(stored) = tables.themes.get_mut(&theme.id) {
            stored.name = theme.name.clone();
            stored.desktop = theme.desktop.clone();
            stored.mobile = theme.mobile.clone();
            stored.is_default = theme.is_default;
            stored.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_theme(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.themes.get(&id).is_some_and(|t| t.tenant_id == tenant_id) {
            return Err(StoreError::NotFound("theme"));
        }
        tables.themes.remove(&id);
        for form in tables.forms.values_mut() {
            if form.theme_id == Some(id) {
                form.theme_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for MemoryStore {
    async fn create_template(&self, template: &FormTemplate) -> Result<()> {
        let tenant_id = template
            .tenant_id
            .ok_or_else(|| StoreError::InvalidData("tenant template needs a tenant".to_string()))?;
        let mut tables = self.tables.write();
        tables.require_tenant(tenant_id)?;
        tables.check_template_name(template)?;
        tables.templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn get_template(&self, tenant_id: Uuid, id: Uuid) -> Result<FormTemplate> {
        self.tables
            .read()
            .templates
            .get(&id)
            .filter(|t| t.tenant_id.map_or(true, |owner| owner == tenant_id))
            .cloned()
            .ok_or(StoreError::NotFound("template"))
    }

    async fn list_templates(&self, tenant_id: Uuid, category: Option<TemplateCategory>) -> Result<Vec<FormTemplate>> {
        let mut templates: Vec<FormTemplate> = self
            .tables
            .read()
            .templates
            .values()
            .filter(|t| t.tenant_id.map_or(true, |owner| owner == tenant_id))
            .filter(|t| category.map_or(true, |c| t.category == c))
            .cloned()
            .collect();
        templates.sort_by(|a, b| {
            b.is_system()
                .cmp(&a.is_system())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(templates)
    }

    async fn insert_system_template(&self, template: &FormTemplate) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.templates.values().any(|t| t.is_system() && t.name == template.name) {
            return Ok(false);
        }
        let mut system = template.clone();
        system.tenant_id = None;
        tables.templates.insert(system.id, system);
        Ok(true)
    }
}

#[async_trait]
impl ToolRepository for MemoryStore {
    async fn create_tool(&self, tool: &ToolRegistryEntry) -> Result<()> {
        let mut tables = self.tables.write();
        tables.require_tenant(tool.tenant_id)?;
        tables.check_tool(tool)?;
        tables.tools.insert(tool.id, tool.clone());
        Ok(())
    }

    async fn get_tool(&self, tenant_id: Uuid, id: Uuid) -> Result<ToolRegistryEntry> {
        self.tables
            .read()
            .tools
            .get(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .ok_or(StoreError::NotFound("tool"))
    }

    async fn list_tools(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<ToolRegistryEntry>> {
        let mut tools: Vec<ToolRegistryEntry> = self
            .tables
            .read()
            .tools
            .values()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(tools, page))
    }

    async fn update_tool(&self, tool: &ToolRegistryEntry) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.tools.get(&tool.id).is_some_and(|t| t.tenant_id == tool.tenant_id) {
            return Err(StoreError::NotFound("tool"));
        }
        tables.check_tool(tool)?;
        if let Some(stored) = tables.tools.get_mut(&tool.id) {
            let created_at = stored.created_at;
            *stored = tool.clone();
            stored.created_at = created_at;
            stored.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_tool(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.tools.get(&id).is_some_and(|t| t.tenant_id == tenant_id) {
            return Err(StoreError::NotFound("tool"));
        }
        tables.tools.remove(&id);
        tables.exports.retain(|_, job| job.tool_id != id);
        Ok(())
    }
}

#[async_trait]
impl ExportRepository for MemoryStore {
    async fn create_export(&self, job: &ExportJob) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.tools.get(&job.tool_id).is_some_and(|t| t.tenant_id == job.tenant_id) {
            return Err(missing("export_jobs_tool_id_fkey"));
        }
        tables.require_user(job.tenant_id, job.requested_by, "export_jobs_requested_by_fkey")?;
        tables.exports.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_export(&self, tenant_id: Uuid, id: Uuid) -> Result<ExportJob> {
        self.tables
            .read()
            .exports
            .get(&id)
            .filter(|j| j.tenant_id == tenant_id)
            .cloned()
            .ok_or(StoreError::NotFound("export job"))
    }

    async fn list_exports(&self, tenant_id: Uuid, tool_id: Option<Uuid>, page: PageRequest) -> Result<Page<ExportJob>> {
        let mut jobs: Vec<ExportJob> = self
            .tables
            .read()
            .exports
            .values()
            .filter(|j| j.tenant_id == tenant_id && tool_id.map_or(true, |t| j.tool_id == t))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(jobs, page))
    }

    async fn update_export(&self, job: &ExportJob) -> Result<()> {
        let mut tables = self.tables.write();
        let stored = tables
            .exports
            .get_mut(&job.id)
            .filter(|j| j.tenant_id == job.tenant_id)
            .ok_or(StoreError::NotFound("export job"))?;
        if stored.status.is_terminal() {
            return Err(StoreError::Finished("export job"));
        }
        stored.status = job.status;
        stored.current_step = job.current_step;
        stored.total_steps = job.total_steps;
        stored.step_label = job.step_label.clone();
        stored.package_path = job.package_path.clone();
        stored.error = job.error.clone();
        stored.started_at = job.started_at;
        stored.finished_at = job.finished_at;
        Ok(())
    }
}

#[async_trait]
impl ShortLinkRepository for MemoryStore {
    async fn create_link(&self, link: &ShortLink) -> Result<()> {
        let mut tables = self.tables.write();
        tables.require_tenant(link.tenant_id)?;
        tables.require_user(link.tenant_id, link.created_by, "short_links_created_by_fkey")?;
        tables.require_form(link.tenant_id, link.form_id, "short_links_form_id_fkey")?;
        if tables.links.values().any(|l| l.code == link.code) {
            return Err(conflict("short_links_code_key"));
        }
        tables.links.insert(link.id, link.clone());
        Ok(())
    }

    async fn list_links(&self, tenant_id: Uuid, page: PageRequest) -> Result<Page<ShortLink>> {
        let mut links: Vec<ShortLink> = self
            .tables
            .read()
            .links
            .values()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(links, page))
    }

    async fn delete_link(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.links.get(&id).is_some_and(|l| l.tenant_id == tenant_id) {
            return Err(StoreError::NotFound("short link"));
        }
        tables.links.remove(&id);
        Ok(())
    }

    async fn resolve_link(&self, code: &str) -> Result<Option<ShortLink>> {
        Ok(self.tables.read().links.values().find(|l| l.code == code).cloned())
    }

    async fn record_click(&self, id: Uuid) -> Result<()> {
        if let Some(link) = self.tables.write().links.get_mut(&id) {
            link.clicks += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
