//! Formcraft Core - Domain model, layout bookkeeping, and validation.
//!
//! This crate holds everything about forms that does not touch I/O:
//! - Entities (tenants, users, forms, themes, templates, tools, exports, short links)
//! - The row/column/sub-column layout state manager
//! - Structural, category-based, and submission validators
//! - Role and plan based access decisions

pub mod error;
pub mod layout;
pub mod model;
pub mod pagination;
pub mod security;
pub mod slug;
pub mod validation;

pub use error::{Error, Result};
pub use layout::{Cell, Layout, LayoutColumn, LayoutOp, LayoutRow, LayoutState};
pub use model::{
    normalize_email, BusinessLogic, ExportJob, ExportStatus, FieldOption, FieldPosition, FieldType, Form,
    FormAnalytics, FormField, FormSchema, FormSettings, FormStatus, FormTemplate, FormTheme, IsolationSettings,
    Plan, Role, ShortLink, StyleConfig, StyleOverrides, Submission, SubmissionOutcome,
    TemplateCategory, Tenant, TenantFeatures, ToolRegistryEntry, ToolStatus, User, UserProfile,
    ValidationRules,
};
pub use pagination::{Page, PageRequest};
pub use security::{AuthContext, FeatureGate, SecurityError, SecurityResult};
pub use validation::{Issue, ValidationReport};
