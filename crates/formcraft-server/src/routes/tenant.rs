//! Tenant settings.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use formcraft_core::{IsolationSettings, Tenant, TenantFeatures};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::response::{ok, ApiResponse};
use crate::routes::required_text;
use crate::state::AppState;

/// Tenant routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/tenant", get(get_tenant).patch(update_tenant))
}

/// A tenant with its plan defaults merged in.
#[derive(Debug, Serialize)]
pub struct TenantView {
    #[serde(flatten)]
    pub tenant: Tenant,
    pub effective_features: TenantFeatures,
}

impl From<Tenant> for TenantView {
    fn from(tenant: Tenant) -> Self {
        let effective_features = tenant.effective_features();
        Self {
            tenant,
            effective_features,
        }
    }
}

/// Tenant-editable settings. Plan and feature overrides are billing data and
/// change only through the `set-plan` command.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub isolation: Option<IsolationSettings>,
}

async fn get_tenant(State(state): State<AppState>, AuthUser(ctx): AuthUser) -> Result<Json<ApiResponse<TenantView>>> {
    let tenant = state.store.get_tenant(ctx.tenant_id).await?;
    Ok(ok(tenant.into()))
}

async fn update_tenant(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<UpdateTenantRequest>,
) -> Result<Json<ApiResponse<TenantView>>> {
    ctx.require_manage_tenant()?;
    let mut tenant = state.store.get_tenant(ctx.tenant_id).await?;

    if let Some(name) = req.name {
        tenant.name = required_text(&name, "tenant name")?;
    }
    if let Some(isolation) = req.isolation {
        if isolation.data_region.trim().is_empty() {
            return Err(AppError::BadRequest("data region must not be empty".to_string()));
        }
        if isolation.retention_days == Some(0) {
            return Err(AppError::BadRequest("retention must be at least one day".to_string()));
        }
        tenant.isolation = isolation;
    }
    tenant.updated_at = Utc::now();

    let tenant = state.store.update_tenant(&tenant).await?;
    tracing::info!(tenant_id = %tenant.id, user_id = %ctx.user_id, "tenant settings updated");
    Ok(ok(tenant.into()))
}
