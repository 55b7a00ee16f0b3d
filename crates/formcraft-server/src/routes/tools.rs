//! Tool registry and export jobs.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use formcraft_core::slug::{is_valid_slug, slugify};
use formcraft_core::{ExportJob, ToolRegistryEntry, ToolStatus};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::response::{created, ok, paged, ApiResponse};
use crate::routes::{double_option, feature_gate, required_text, PageParams};
use crate::state::AppState;

/// Tool and export routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tools", get(list_tools).post(create_tool))
        .route("/api/tools/:id", get(get_tool).patch(update_tool).delete(delete_tool))
        .route("/api/tools/:id/exports", post(start_export))
        .route("/api/exports", get(list_exports))
        .route("/api/exports/:id", get(get_export))
        .route("/api/exports/:id/cancel", post(cancel_export))
}

#[derive(Debug, Deserialize)]
pub struct CreateToolRequest {
    pub name: String,
    /// Defaults to the slugified name.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub config: Option<Value>,
    pub form_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateToolRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub version: Option<String>,
    pub config: Option<Value>,
    pub status: Option<ToolStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub form_id: Option<Option<Uuid>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListExportsParams {
    pub tool_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// An export job with its completion percentage.
#[derive(Debug, Serialize)]
pub struct ExportView {
    #[serde(flatten)]
    pub job: ExportJob,
    pub progress_percent: u32,
}

impl From<ExportJob> for ExportView {
    fn from(job: ExportJob) -> Self {
        let progress_percent = job.progress_percent();
        Self { job, progress_percent }
    }
}

fn check_tool(tool: &ToolRegistryEntry) -> Result<()> {
    let report = tool.validate();
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }
    Ok(())
}

async fn list_tools(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<ToolRegistryEntry>>>> {
    Ok(paged(state.store.list_tools(ctx.tenant_id, params.request()).await?))
}

async fn create_tool(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<CreateToolRequest>,
) -> Result<impl IntoResponse> {
    ctx.require_manage_tools()?;
    let name = required_text(&req.name, "tool name")?;
    let slug = match req.slug.as_deref().map(str::trim) {
        Some(slug) if is_valid_slug(slug) => slug.to_string(),
        Some(slug) => {
            return Err(AppError::BadRequest(format!(
                "slug {slug:?} may only contain lowercase letters, digits, and single dashes"
            )));
        }
        None => slugify(&name),
    };
    if let Some(form_id) = req.form_id {
        state.store.get_form(ctx.tenant_id, form_id).await?;
    }

    let mut tool = ToolRegistryEntry::new(ctx.tenant_id, name, slug);
    tool.description = req.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    if let Some(version) = req.version {
        tool.version = version.trim().to_string();
    }
    if let Some(config) = req.config {
        tool.config = config;
    }
    tool.form_id = req.form_id;
    check_tool(&tool)?;

    state.store.create_tool(&tool).await?;
    tracing::info!(tool_id = %tool.id, tenant_id = %ctx.tenant_id, slug = %tool.slug, "tool registered");
    Ok(created(tool))
}

async fn get_tool(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ToolRegistryEntry>>> {
    Ok(ok(state.store.get_tool(ctx.tenant_id, id).await?))
}

async fn update_tool(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateToolRequest>,
) -> Result<Json<ApiResponse<ToolRegistryEntry>>> {
    ctx.require_manage_tools()?;
    let mut tool = state.store.get_tool(ctx.tenant_id, id).await?;

    if let Some(name) = req.name {
        tool.name = required_text(&name, "tool name")?;
    }
    if let Some(description) = req.description {
        tool.description = description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    }
    if let Some(version) = req.version {
        tool.version = version.trim().to_string();
    }
    if let Some(config) = req.config {
        tool.config = config;
    }
    if let Some(status) = req.status {
        tool.status = status;
    }
    if let Some(form_id) = req.form_id {
        if let Some(form_id) = form_id {
            state.store.get_form(ctx.tenant_id, form_id).await?;
        }
        tool.form_id = form_id;
    }
    check_tool(&tool)?;
    tool.updated_at = Utc::now();

    state.store.update_tool(&tool).await?;
    Ok(ok(tool))
}

async fn delete_tool(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>> {
    ctx.require_manage_tools()?;
    state.store.delete_tool(ctx.tenant_id, id).await?;
    tracing::info!(tool_id = %id, tenant_id = %ctx.tenant_id, "tool deleted");
    Ok(ok(json!({ "id": id, "deleted": true })))
}

async fn start_export(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    ctx.require_manage_tools()?;
    feature_gate(&state, ctx.tenant_id).await?.require_tool_exports()?;

    let tool = state.store.get_tool(ctx.tenant_id, id).await?;
    if tool.status == ToolStatus::Deprecated {
        return Err(AppError::BadRequest(format!("tool {:?} is deprecated", tool.slug)));
    }

    let job = ExportJob::new(ctx.tenant_id, tool.id, ctx.user_id);
    state.store.create_export(&job).await?;
    state.exports.spawn(job.clone());

    tracing::info!(job_id = %job.id, tool_id = %tool.id, tenant_id = %ctx.tenant_id, "export queued");
    Ok(created(ExportView::from(job)))
}

async fn list_exports(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<ListExportsParams>,
) -> Result<Json<ApiResponse<Vec<ExportView>>>> {
    let request = PageParams {
        page: params.page,
        per_page: params.per_page,
    }
    .request();
    let page = state
        .store
        .list_exports(ctx.tenant_id, params.tool_id, request)
        .await?;
    Ok(paged(page.map(ExportView::from)))
}

async fn get_export(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExportView>>> {
    Ok(ok(state.store.get_export(ctx.tenant_id, id).await?.into()))
}

async fn cancel_export(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ExportView>>> {
    ctx.require_manage_tools()?;
    let job = state.exports.cancel(ctx.tenant_id, id).await?;
    Ok(ok(job.into()))
}
