//! Form management: CRUD, schema and layout edits, publication, results.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use formcraft_core::layout::{self, LayoutOp, LayoutState};
use formcraft_core::slug::{is_valid_slug, slugify, with_suffix};
use formcraft_core::validation::{is_http_url, validate_business_logic, validate_for_publish, validate_schema};
use formcraft_core::{
    AuthContext, Form, FormAnalytics, FormSchema, FormSettings, FormStatus, Submission, TemplateCategory,
};
use formcraft_store::{FormFilter, StoreError};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::response::{created, ok, paged, ApiResponse};
use crate::routes::{double_option, feature_gate, required_text, PageParams};
use crate::state::AppState;

/// Attempts at finding a free `-N` slug suffix.
const MAX_SLUG_ATTEMPTS: u32 = 100;
/// Longest analytics window in days.
const MAX_ANALYTICS_DAYS: u32 = 365;

/// Form routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/forms", get(list_forms).post(create_form))
        .route("/api/forms/:id", get(get_form).patch(update_form).delete(delete_form))
        .route("/api/forms/:id/schema", put(replace_schema))
        .route("/api/forms/:id/layout", post(apply_layout))
        .route("/api/forms/:id/publish", post(publish_form))
        .route("/api/forms/:id/unpublish", post(unpublish_form))
        .route("/api/forms/:id/archive", post(archive_form))
        .route("/api/forms/:id/duplicate", post(duplicate_form))
        .route("/api/forms/:id/submissions", get(list_submissions))
        .route("/api/forms/:id/analytics", get(form_analytics))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFormsParams {
    pub status: Option<FormStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFormRequest {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to the slugified title.
    pub slug: Option<String>,
    /// Copy schema and business logic from this template.
    pub template_id: Option<Uuid>,
    /// Ignored when `template_id` is set.
    pub schema: Option<FormSchema>,
    pub theme_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFormRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub theme_id: Option<Option<Uuid>>,
    pub settings: Option<FormSettings>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub days: Option<u32>,
}

/// Result of one layout operation.
#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub op: &'static str,
    pub form: Form,
}

/// First free slug among `base`, `base-2`, `base-3`, ...
async fn unique_slug(state: &AppState, tenant_id: Uuid, base: &str) -> Result<String> {
    for n in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = if n == 1 { base.to_string() } else { with_suffix(base, n) };
        if !state.store.form_slug_exists(tenant_id, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict(format!("no free slug left for {base:?}")))
}

fn requested_slug(slug: &str) -> Result<String> {
    let slug = slug.trim();
    if !is_valid_slug(slug) {
        return Err(AppError::BadRequest(format!(
            "slug {slug:?} may only contain lowercase letters, digits, and single dashes"
        )));
    }
    Ok(slug.to_string())
}

/// Bring a stored or submitted schema onto the current layout and check it.
fn prepare_schema(schema: FormSchema) -> Result<FormSchema> {
    let (schema, migrated) = layout::migrate(schema);
    if migrated {
        tracing::debug!(fields = schema.fields.len(), "migrated legacy layout");
    }
    let report = validate_schema(&schema);
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }
    check_settings(&schema.settings)?;
    Ok(schema)
}

fn check_settings(settings: &FormSettings) -> Result<()> {
    if let Some(url) = &settings.redirect_url {
        if !is_http_url(url) {
            return Err(AppError::BadRequest("redirect URL must be an http(s) URL".to_string()));
        }
    }
    let report = validate_business_logic(&settings.logic);
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }
    Ok(())
}

/// Load a form the caller may edit.
async fn editable_form(state: &AppState, ctx: &AuthContext, id: Uuid) -> Result<Form> {
    let form = state.store.get_form(ctx.tenant_id, id).await?;
    ctx.require_edit_form(form.owner_id)?;
    Ok(form)
}

/// Category whose rules apply at publication: the source template's, else the logic's.
async fn publish_category(state: &AppState, form: &Form) -> Result<Option<TemplateCategory>> {
    if let Some(template_id) = form.template_id {
        match state.store.get_template(form.tenant_id, template_id).await {
            Ok(template) => return Ok(Some(template.category)),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(form.schema.settings.logic.category())
}

/// A published form must keep passing its publish checks after an edit.
async fn check_still_publishable(state: &AppState, form: &Form) -> Result<()> {
    if form.status != FormStatus::Published {
        return Ok(());
    }
    let mut report = validate_for_publish(&form.schema, publish_category(state, form).await?);
    report.merge(validate_business_logic(&form.schema.settings.logic));
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }
    Ok(())
}

async fn transition(state: &AppState, ctx: &AuthContext, id: Uuid, next: FormStatus) -> Result<Form> {
    let mut form = editable_form(state, ctx, id).await?;
    let from = form.status;
    form.transition(next)?;
    state.store.update_form(&form).await?;
    tracing::info!(form_id = %form.id, tenant_id = %ctx.tenant_id, %from, to = %next, "form status changed");
    Ok(form)
}

async fn list_forms(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<ListFormsParams>,
) -> Result<Json<ApiResponse<Vec<Form>>>> {
    let filter = FormFilter {
        status: params.status,
        search: params.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };
    let request = PageParams {
        page: params.page,
        per_page: params.per_page,
    }
    .request();
    let page = state.store.list_forms(ctx.tenant_id, &filter, request).await?;
    Ok(paged(page))
}

async fn create_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<CreateFormRequest>,
) -> Result<impl IntoResponse> {
    ctx.require_create_forms()?;
    let gate = feature_gate(&state, ctx.tenant_id).await?;
    gate.check_form_quota(state.store.count_forms(ctx.tenant_id).await?)?;

    let title = required_text(&req.title, "title")?;
    let schema = match req.template_id {
        Some(template_id) => state
            .store
            .get_template(ctx.tenant_id, template_id)
            .await?
            .instantiate_schema(),
        None => req.schema.unwrap_or_default(),
    };
    let schema = prepare_schema(schema)?;

    if let Some(theme_id) = req.theme_id {
        state.store.get_theme(ctx.tenant_id, theme_id).await?;
    }

    let base = match req.slug.as_deref() {
        Some(slug) => requested_slug(slug)?,
        None => slugify(&title),
    };
    let slug = unique_slug(&state, ctx.tenant_id, &base).await?;

    let mut form = Form::new(ctx.tenant_id, ctx.user_id, title, slug, schema);
    form.description = req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    form.template_id = req.template_id;
    form.theme_id = req.theme_id;
    state.store.create_form(&form).await?;

    tracing::info!(form_id = %form.id, tenant_id = %ctx.tenant_id, slug = %form.slug, template_id = ?form.template_id, "form created");
    Ok(created(form))
}

async fn get_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Form>>> {
    Ok(ok(state.store.get_form(ctx.tenant_id, id).await?))
}

async fn update_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateFormRequest>,
) -> Result<Json<ApiResponse<Form>>> {
    let mut form = editable_form(&state, &ctx, id).await?;

    if let Some(title) = req.title {
        form.title = required_text(&title, "title")?;
    }
    if let Some(description) = req.description {
        form.description = description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    }
    if let Some(slug) = req.slug {
        let slug = requested_slug(&slug)?;
        if slug != form.slug && state.store.form_slug_exists(ctx.tenant_id, &slug).await? {
            return Err(AppError::Conflict("a form with this slug already exists".to_string()));
        }
        form.slug = slug;
    }
    if let Some(theme_id) = req.theme_id {
        if let Some(theme_id) = theme_id {
            state.store.get_theme(ctx.tenant_id, theme_id).await?;
        }
        form.theme_id = theme_id;
    }
    if let Some(settings) = req.settings {
        check_settings(&settings)?;
        form.schema.settings = settings;
        check_still_publishable(&state, &form).await?;
    }
    form.updated_at = Utc::now();

    state.store.update_form(&form).await?;
    Ok(ok(form))
}

async fn delete_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>> {
    let form = editable_form(&state, &ctx, id).await?;
    state.store.soft_delete_form(ctx.tenant_id, form.id).await?;
    tracing::info!(form_id = %form.id, tenant_id = %ctx.tenant_id, by = %ctx.user_id, "form deleted");
    Ok(ok(json!({ "id": form.id, "deleted": true })))
}

async fn replace_schema(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Json(schema): Json<FormSchema>,
) -> Result<Json<ApiResponse<Form>>> {
    let mut form = editable_form(&state, &ctx, id).await?;
    form.schema = prepare_schema(schema)?;
    check_still_publishable(&state, &form).await?;

    form.updated_at = Utc::now();
    state.store.update_form(&form).await?;
    Ok(ok(form))
}

async fn apply_layout(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Json(op): Json<LayoutOp>,
) -> Result<Json<ApiResponse<LayoutResponse>>> {
    let mut form = editable_form(&state, &ctx, id).await?;
    let name = op.name();

    let (schema, _) = layout::migrate(form.schema);
    let mut layout_state = LayoutState::new(schema);
    layout_state.apply(op)?;
    let schema = layout_state.into_schema();

    let report = validate_schema(&schema);
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }

    form.schema = schema;
    check_still_publishable(&state, &form).await?;
    form.updated_at = Utc::now();
    state.store.update_form(&form).await?;
    tracing::debug!(form_id = %form.id, op = name, "layout operation applied");
    Ok(ok(LayoutResponse { op: name, form }))
}

async fn publish_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Form>>> {
    let form = editable_form(&state, &ctx, id).await?;
    let category = publish_category(&state, &form).await?;
    let mut report = validate_for_publish(&form.schema, category);
    report.merge(validate_business_logic(&form.schema.settings.logic));
    if !report.is_valid() {
        tracing::debug!(form_id = %form.id, errors = report.errors.len(), "publish rejected");
        return Err(AppError::validation(report));
    }
    Ok(ok(transition(&state, &ctx, id, FormStatus::Published).await?))
}

async fn unpublish_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Form>>> {
    Ok(ok(transition(&state, &ctx, id, FormStatus::Draft).await?))
}

async fn archive_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Form>>> {
    Ok(ok(transition(&state, &ctx, id, FormStatus::Archived).await?))
}

async fn duplicate_form(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    ctx.require_create_forms()?;
    let source = state.store.get_form(ctx.tenant_id, id).await?;
    let gate = feature_gate(&state, ctx.tenant_id).await?;
    gate.check_form_quota(state.store.count_forms(ctx.tenant_id).await?)?;

    let slug = unique_slug(&state, ctx.tenant_id, &source.slug).await?;
    let mut copy = Form::new(
        ctx.tenant_id,
        ctx.user_id,
        format!("{} (copy)", source.title),
        slug,
        source.schema.clone(),
    );
    copy.description = source.description.clone();
    copy.theme_id = source.theme_id;
    copy.template_id = source.template_id;
    state.store.create_form(&copy).await?;

    tracing::info!(form_id = %copy.id, source_id = %source.id, tenant_id = %ctx.tenant_id, "form duplicated");
    Ok(created(copy))
}

async fn list_submissions(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<Submission>>>> {
    let form = state.store.get_form(ctx.tenant_id, id).await?;
    let page = state
        .store
        .list_submissions(ctx.tenant_id, form.id, params.request())
        .await?;
    Ok(paged(page))
}

async fn form_analytics(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<ApiResponse<FormAnalytics>>> {
    let days = params.days.unwrap_or(30).clamp(1, MAX_ANALYTICS_DAYS);
    let form = state.store.get_form(ctx.tenant_id, id).await?;

    let since = (Utc::now() - Duration::days(i64::from(days) - 1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|start| start.and_utc())
        .unwrap_or_else(Utc::now);
    let recent = state.store.submissions_since(ctx.tenant_id, form.id, since).await?;
    let total = state.store.count_submissions(ctx.tenant_id, form.id).await?;

    Ok(ok(FormAnalytics::compute(&form.schema, &recent, total, days)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcraft_core::{FieldType, FormField};

    #[test]
    fn test_requested_slug() {
        assert_eq!(requested_slug(" contact-us ").unwrap(), "contact-us");
        assert!(requested_slug("Contact Us").is_err());
        assert!(requested_slug("a--b").is_err());
    }

    #[test]
    fn test_prepare_schema_positions_legacy_fields() {
        let schema = FormSchema {
            fields: vec![
                FormField::new(FieldType::Text, "name", "Name"),
                FormField::new(FieldType::Email, "email", "Email"),
            ],
            ..Default::default()
        };
        let prepared = prepare_schema(schema).unwrap();
        assert_eq!(prepared.layout.rows.len(), 2);
        assert!(prepared.fields.iter().all(|f| f.position.is_some()));
    }

    #[test]
    fn test_prepare_schema_rejects_duplicate_names() {
        let schema = FormSchema::from_fields(vec![
            FormField::new(FieldType::Text, "name", "Name"),
            FormField::new(FieldType::Text, "name", "Other"),
        ]);
        assert!(matches!(prepare_schema(schema), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_redirect_url_must_be_http() {
        let settings = FormSettings {
            redirect_url: Some("javascript:alert(1)".into()),
            ..Default::default()
        };
        assert!(check_settings(&settings).is_err());
    }
}
