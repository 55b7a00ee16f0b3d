//! Form templates: shared system templates plus each tenant's own.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use formcraft_core::layout;
use formcraft_core::validation::{validate_schema, validate_template};
use formcraft_core::{BusinessLogic, FormSchema, FormTemplate, Issue, TemplateCategory, ValidationReport};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::response::{created, ok, ApiResponse};
use crate::routes::required_text;
use crate::state::AppState;

/// Template routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/templates", get(list_templates).post(create_template))
        .route("/api/templates/validate", post(validate))
        .route("/api/templates/:id", get(get_template))
}

#[derive(Debug, Deserialize)]
pub struct TemplateParams {
    pub category: Option<TemplateCategory>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: TemplateCategory,
    #[serde(default)]
    pub business_logic: BusinessLogic,
    #[serde(default)]
    pub schema: FormSchema,
}

/// Dry-run validator output.
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl From<ValidationReport> for ValidationResponse {
    fn from(report: ValidationReport) -> Self {
        Self {
            valid: report.is_valid(),
            errors: report.errors,
            warnings: report.warnings,
        }
    }
}

/// Structural plus category checks on a migrated copy of the schema.
fn check_request(req: &TemplateRequest) -> (FormSchema, ValidationReport) {
    let (schema, _) = layout::migrate(req.schema.clone());
    let mut report = validate_schema(&schema);
    report.merge(validate_template(req.category, &req.business_logic, &schema));
    (schema, report)
}

async fn list_templates(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<TemplateParams>,
) -> Result<Json<ApiResponse<Vec<FormTemplate>>>> {
    let templates = state.store.list_templates(ctx.tenant_id, params.category).await?;
    Ok(ok(templates))
}

async fn get_template(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FormTemplate>>> {
    Ok(ok(state.store.get_template(ctx.tenant_id, id).await?))
}

async fn create_template(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<TemplateRequest>,
) -> Result<impl IntoResponse> {
    ctx.require_create_forms()?;
    let name = required_text(&req.name, "template name")?;

    let (schema, report) = check_request(&req);
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }

    let mut template = FormTemplate::new(Some(ctx.tenant_id), name, req.category, req.business_logic, schema);
    template.description = req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    state.store.create_template(&template).await?;

    tracing::info!(template_id = %template.id, tenant_id = %ctx.tenant_id, category = %template.category, "template created");
    Ok(created(template))
}

async fn validate(
    AuthUser(_ctx): AuthUser,
    Json(req): Json<TemplateRequest>,
) -> Json<ApiResponse<ValidationResponse>> {
    let (_, report) = check_request(&req);
    ok(report.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcraft_core::{FieldType, FormField};

    fn request(category: TemplateCategory, fields: Vec<FormField>) -> TemplateRequest {
        TemplateRequest {
            name: "T".into(),
            description: None,
            category,
            business_logic: BusinessLogic::None,
            schema: FormSchema::from_fields(fields),
        }
    }

    #[test]
    fn test_contact_template_needs_email() {
        let (_, report) = check_request(&request(
            TemplateCategory::Contact,
            vec![FormField::new(FieldType::Textarea, "message", "Message")],
        ));
        assert!(!report.is_valid());

        let (schema, report) = check_request(&request(
            TemplateCategory::Contact,
            vec![
                FormField::new(FieldType::Email, "email", "Email"),
                FormField::new(FieldType::Textarea, "message", "Message"),
            ],
        ));
        assert!(report.is_valid(), "{}", report.summary());
        assert!(schema.fields.iter().all(|f| f.position.is_some()));
    }
}
