//! Row decoding.
//!
//! Column lists are macros so they can be spliced into `concat!` and the
//! queries stay `&'static str`.

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;

use formcraft_core::{
    BusinessLogic, ExportJob, Form, FormSchema, FormTemplate, FormTheme, IsolationSettings, ShortLink,
    StyleConfig, StyleOverrides, Submission, SubmissionOutcome, Tenant, TenantFeatures, ToolRegistryEntry,
    User,
};

use crate::error::{Result, StoreError};

macro_rules! tenant_columns {
    () => {
        "id, name, slug, plan, features, isolation, created_at, updated_at"
    };
}

macro_rules! user_columns {
    () => {
        "id, tenant_id, email, name, role, password_hash, is_active, last_login_at, created_at, updated_at"
    };
}

macro_rules! form_columns {
    () => {
        "id, tenant_id, owner_id, title, description, slug, status, schema, theme_id, template_id, \
         published_at, deleted_at, created_at, updated_at"
    };
}

macro_rules! submission_columns {
    () => {
        "id, tenant_id, form_id, answers, outcome, submitted_at, client_ip"
    };
}

macro_rules! theme_columns {
    () => {
        "id, tenant_id, name, desktop, mobile, is_default, created_at, updated_at"
    };
}

macro_rules! template_columns {
    () => {
        "id, tenant_id, name, description, category, business_logic, schema, created_at, updated_at"
    };
}

macro_rules! tool_columns {
    () => {
        "id, tenant_id, form_id, name, slug, description, version, config, status, created_at, updated_at"
    };
}

macro_rules! export_columns {
    () => {
        "id, tenant_id, tool_id, requested_by, status, current_step, total_steps, step_label, \
         package_path, error, created_at, started_at, finished_at"
    };
}

macro_rules! link_columns {
    () => {
        "id, tenant_id, code, target_url, form_id, clicks, expires_at, created_by, created_at"
    };
}

pub(crate) use {
    export_columns, form_columns, link_columns, submission_columns, template_columns, tenant_columns,
    theme_columns, tool_columns, user_columns,
};

fn to_u32(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} is negative: {value}")))
}

/// Convert a count from `COUNT(*)`.
pub(crate) fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub(crate) fn tenant_from_row(row: &PgRow) -> Result<Tenant> {
    Ok(Tenant {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        plan: row.try_get::<String, _>("plan")?.parse()?,
        features: row.try_get::<Json<TenantFeatures>, _>("features")?.0,
        isolation: row.try_get::<Json<IsolationSettings>, _>("isolation")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        password_hash: row.try_get("password_hash")?,
        is_active: row.try_get("is_active")?,
        last_login_at: row.try_get("last_login_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn form_from_row(row: &PgRow) -> Result<Form> {
    Ok(Form {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        slug: row.try_get("slug")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        schema: row.try_get::<Json<FormSchema>, _>("schema")?.0,
        theme_id: row.try_get("theme_id")?,
        template_id: row.try_get("template_id")?,
        published_at: row.try_get("published_at")?,
        deleted_at: row.try_get("deleted_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn submission_from_row(row: &PgRow) -> Result<Submission> {
    let answers = match row.try_get::<Json<serde_json::Value>, _>("answers")?.0 {
        serde_json::Value::Object(map) => map,
        other => return Err(StoreError::Decode(format!("answers is not an object: {other}"))),
    };
    Ok(Submission {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        form_id: row.try_get("form_id")?,
        answers,
        outcome: row.try_get::<Json<SubmissionOutcome>, _>("outcome")?.0,
        submitted_at: row.try_get("submitted_at")?,
        client_ip: row.try_get("client_ip")?,
    })
}

pub(crate) fn theme_from_row(row: &PgRow) -> Result<FormTheme> {
    Ok(FormTheme {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        name: row.try_get("name")?,
        desktop: row.try_get::<Json<StyleConfig>, _>("desktop")?.0,
        mobile: row.try_get::<Json<StyleOverrides>, _>("mobile")?.0,
        is_default: row.try_get("is_default")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn template_from_row(row: &PgRow) -> Result<FormTemplate> {
    Ok(FormTemplate {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get::<String, _>("category")?.parse()?,
        business_logic: row.try_get::<Json<BusinessLogic>, _>("business_logic")?.0,
        schema: row.try_get::<Json<FormSchema>, _>("schema")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn tool_from_row(row: &PgRow) -> Result<ToolRegistryEntry> {
    Ok(ToolRegistryEntry {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        form_id: row.try_get("form_id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        version: row.try_get("version")?,
        config: row.try_get::<Json<serde_json::Value>, _>("config")?.0,
        status: row.try_get::<String, _>("status")?.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn export_from_row(row: &PgRow) -> Result<ExportJob> {
    Ok(ExportJob {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        tool_id: row.try_get("tool_id")?,
        requested_by: row.try_get("requested_by")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        current_step: to_u32(row.try_get("current_step")?, "current_step")?,
        total_steps: to_u32(row.try_get("total_steps")?, "total_steps")?,
        step_label: row.try_get("step_label")?,
        package_path: row.try_get("package_path")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

pub(crate) fn link_from_row(row: &PgRow) -> Result<ShortLink> {
    Ok(ShortLink {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        code: row.try_get("code")?,
        target_url: row.try_get("target_url")?,
        form_id: row.try_get("form_id")?,
        clicks: row.try_get("clicks")?,
        expires_at: row.try_get("expires_at")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}
