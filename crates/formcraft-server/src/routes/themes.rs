//! Form themes.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use formcraft_core::{AuthContext, FormTheme, StyleConfig, StyleOverrides};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::response::{created, ok, ApiResponse};
use crate::routes::{feature_gate, required_text};
use crate::state::AppState;

/// Theme routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/themes", get(list_themes).post(create_theme))
        .route("/api/themes/:id", get(get_theme).patch(update_theme).delete(delete_theme))
}

#[derive(Debug, Deserialize)]
pub struct CreateThemeRequest {
    pub name: String,
    #[serde(default)]
    pub desktop: StyleConfig,
    #[serde(default)]
    pub mobile: StyleOverrides,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateThemeRequest {
    pub name: Option<String>,
    pub desktop: Option<StyleConfig>,
    pub mobile: Option<StyleOverrides>,
    pub is_default: Option<bool>,
}

/// A theme with its resolved mobile style.
#[derive(Debug, Serialize)]
pub struct ThemeView {
    #[serde(flatten)]
    pub theme: FormTheme,
    pub effective_mobile: StyleConfig,
}

impl From<FormTheme> for ThemeView {
    fn from(theme: FormTheme) -> Self {
        let effective_mobile = theme.effective_mobile();
        Self { theme, effective_mobile }
    }
}

async fn require_theme_editing(state: &AppState, ctx: &AuthContext) -> Result<()> {
    ctx.require_create_forms()?;
    feature_gate(state, ctx.tenant_id).await?.require_custom_themes()?;
    Ok(())
}

fn check_theme(theme: &FormTheme) -> Result<()> {
    let report = theme.validate();
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }
    Ok(())
}

async fn list_themes(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<ApiResponse<Vec<ThemeView>>>> {
    let themes = state.store.list_themes(ctx.tenant_id).await?;
    Ok(ok(themes.into_iter().map(ThemeView::from).collect()))
}

async fn create_theme(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<CreateThemeRequest>,
) -> Result<impl IntoResponse> {
    require_theme_editing(&state, &ctx).await?;

    let mut theme = FormTheme::new(ctx.tenant_id, required_text(&req.name, "theme name")?, req.desktop);
    theme.mobile = req.mobile;
    theme.is_default = req.is_default;
    check_theme(&theme)?;

    state.store.create_theme(&theme).await?;
    tracing::info!(theme_id = %theme.id, tenant_id = %ctx.tenant_id, is_default = theme.is_default, "theme created");
    Ok(created(ThemeView::from(theme)))
}

async fn get_theme(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ThemeView>>> {
    Ok(ok(state.store.get_theme(ctx.tenant_id, id).await?.into()))
}

async fn update_theme(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateThemeRequest>,
) -> Result<Json<ApiResponse<ThemeView>>> {
    require_theme_editing(&state, &ctx).await?;
    let mut theme = state.store.get_theme(ctx.tenant_id, id).await?;

    if let Some(name) = req.name {
        theme.name = required_text(&name, "theme name")?;
    }
    if let Some(desktop) = req.desktop {
        theme.desktop = desktop;
    }
    if let Some(mobile) = req.mobile {
        theme.mobile = mobile;
    }
    if let Some(is_default) = req.is_default {
        theme.is_default = is_default;
    }
    check_theme(&theme)?;
    theme.updated_at = Utc::now();

    state.store.update_theme(&theme).await?;
    Ok(ok(theme.into()))
}

async fn delete_theme(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>> {
    ctx.require_create_forms()?;
    state.store.delete_theme(ctx.tenant_id, id).await?;
    tracing::info!(theme_id = %id, tenant_id = %ctx.tenant_id, "theme deleted");
    Ok(ok(json!({ "id": id, "deleted": true })))
}
