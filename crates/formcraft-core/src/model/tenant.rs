//! Tenants, plans, and feature flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    /// Subscription plan of a tenant.
    pub enum Plan: "plan" {
        /// Free tier.
        Free => "free",
        /// Paid tier.
        Pro => "pro",
        /// Contract tier, no limits.
        Enterprise => "enterprise",
    }
}

impl Default for Plan {
    fn default() -> Self {
        Plan::Free
    }
}

impl Plan {
    /// Feature flags granted by the plan before any per-tenant override.
    pub fn default_features(&self) -> TenantFeatures {
        match self {
            Plan::Free => TenantFeatures {
                custom_themes: Some(false),
                tool_exports: Some(false),
                short_links: Some(true),
                max_forms: Some(5),
                max_submissions_per_form: Some(100),
            },
            Plan::Pro => TenantFeatures {
                custom_themes: Some(true),
                tool_exports: Some(true),
                short_links: Some(true),
                max_forms: Some(100),
                max_submissions_per_form: Some(10_000),
            },
            Plan::Enterprise => TenantFeatures {
                custom_themes: Some(true),
                tool_exports: Some(true),
                short_links: Some(true),
                max_forms: None,
                max_submissions_per_form: None,
            },
        }
    }
}

/// Feature flags and quotas.
///
/// Stored values are overrides: a `None` boolean falls back to the plan.
/// For the quotas a `None` after merging means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantFeatures {
    /// Tenant may create its own themes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_themes: Option<bool>,
    /// Tenant may export tools as packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_exports: Option<bool>,
    /// Tenant may create short links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_links: Option<bool>,
    /// Maximum number of live (non-deleted) forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_forms: Option<u32>,
    /// Maximum number of submissions per form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_submissions_per_form: Option<u32>,
}

impl TenantFeatures {
    /// Merge stored overrides over plan defaults, field by field.
    pub fn merged(plan: Plan, overrides: &TenantFeatures) -> TenantFeatures {
        let defaults = plan.default_features();
        TenantFeatures {
            custom_themes: overrides.custom_themes.or(defaults.custom_themes),
            tool_exports: overrides.tool_exports.or(defaults.tool_exports),
            short_links: overrides.short_links.or(defaults.short_links),
            max_forms: overrides.max_forms.or(defaults.max_forms),
            max_submissions_per_form: overrides
                .max_submissions_per_form
                .or(defaults.max_submissions_per_form),
        }
    }
}

/// Data isolation preferences recorded for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationSettings {
    /// Region the tenant's data is expected to live in.
    pub data_region: String,
    /// When set, cross-tenant admin tooling is refused for this tenant.
    #[serde(default)]
    pub strict_isolation: bool,
    /// Days after which submissions may be purged. `None` keeps them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            data_region: "default".to_string(),
            strict_isolation: false,
            retention_days: None,
        }
    }
}

/// A customer organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// URL-safe unique handle.
    pub slug: String,
    /// Subscription plan.
    pub plan: Plan,
    /// Stored feature overrides.
    pub features: TenantFeatures,
    /// Isolation preferences.
    pub isolation: IsolationSettings,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new tenant on the given plan.
    pub fn new(name: impl Into<String>, slug: impl Into<String>, plan: Plan) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            plan,
            features: TenantFeatures::default(),
            isolation: IsolationSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Features in effect: plan defaults with stored overrides applied.
    pub fn effective_features(&self) -> TenantFeatures {
        TenantFeatures::merged(self.plan, &self.features)
    }
}
