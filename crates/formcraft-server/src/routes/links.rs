//! Short links.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use formcraft_core::slug::{generate_short_code, validate_alias, validate_target_url};
use formcraft_core::ShortLink;
use formcraft_store::StoreError;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::response::{created, ok, paged, ApiResponse};
use crate::routes::{feature_gate, PageParams};
use crate::state::AppState;

/// Fresh codes tried before giving up on a collision streak.
const CODE_ATTEMPTS: usize = 5;

/// Short link routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/links", get(list_links).post(create_link))
        .route("/api/links/:id", delete(delete_link))
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    /// Defaults to the public URL of `form_id`.
    pub target_url: Option<String>,
    pub form_id: Option<Uuid>,
    /// Custom code instead of a random one.
    pub alias: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A link with its public URL.
#[derive(Debug, Serialize)]
pub struct LinkView {
    #[serde(flatten)]
    pub link: ShortLink,
    pub short_url: String,
}

fn view(state: &AppState, link: ShortLink) -> LinkView {
    let short_url = state.short_url(&link.code);
    LinkView { link, short_url }
}

async fn list_links(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<LinkView>>>> {
    let page = state.store.list_links(ctx.tenant_id, params.request()).await?;
    Ok(paged(page.map(|link| view(&state, link))))
}

async fn create_link(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<CreateLinkRequest>,
) -> Result<impl IntoResponse> {
    ctx.require_create_forms()?;
    feature_gate(&state, ctx.tenant_id).await?.require_short_links()?;

    let target_url = match (req.target_url, req.form_id) {
        (Some(url), form_id) => {
            if let Some(form_id) = form_id {
                state.store.get_form(ctx.tenant_id, form_id).await?;
            }
            url.trim().to_string()
        }
        (None, Some(form_id)) => {
            let form = state.store.get_form(ctx.tenant_id, form_id).await?;
            let tenant = state.store.get_tenant(ctx.tenant_id).await?;
            format!(
                "{}/api/public/{}/forms/{}",
                state.config.public_base_url, tenant.slug, form.slug
            )
        }
        (None, None) => {
            return Err(AppError::BadRequest("either target_url or form_id is required".to_string()));
        }
    };
    validate_target_url(&target_url)?;

    if let Some(expires_at) = req.expires_at {
        if expires_at <= Utc::now() {
            return Err(AppError::BadRequest("expiry must be in the future".to_string()));
        }
    }

    let link = match req.alias {
        Some(alias) => {
            let alias = alias.trim().to_string();
            validate_alias(&alias)?;
            let link = new_link(ctx.tenant_id, alias, &target_url, req.form_id, req.expires_at, ctx.user_id);
            state.store.create_link(&link).await?;
            link
        }
        None => {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let link = new_link(
                    ctx.tenant_id,
                    generate_short_code(),
                    &target_url,
                    req.form_id,
                    req.expires_at,
                    ctx.user_id,
                );
                match state.store.create_link(&link).await {
                    Ok(()) => break link,
                    Err(StoreError::Conflict(_)) if attempt < CODE_ATTEMPTS => {
                        tracing::debug!(code = %link.code, attempt, "short code collision");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
    };

    tracing::info!(link_id = %link.id, code = %link.code, tenant_id = %ctx.tenant_id, "short link created");
    Ok(created(view(&state, link)))
}

fn new_link(
    tenant_id: Uuid,
    code: String,
    target_url: &str,
    form_id: Option<Uuid>,
    expires_at: Option<DateTime<Utc>>,
    created_by: Uuid,
) -> ShortLink {
    let mut link = ShortLink::new(tenant_id, code, target_url, created_by);
    link.form_id = form_id;
    link.expires_at = expires_at;
    link
}

async fn delete_link(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>> {
    ctx.require_create_forms()?;
    state.store.delete_link(ctx.tenant_id, id).await?;
    tracing::info!(link_id = %id, tenant_id = %ctx.tenant_id, "short link deleted");
    Ok(ok(json!({ "id": id, "deleted": true })))
}
