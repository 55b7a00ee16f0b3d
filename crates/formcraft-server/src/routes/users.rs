//! User management inside a tenant.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use formcraft_core::{Role, User, UserProfile};

use crate::auth::{check_password_policy, hash_password_blocking, AuthUser};
use crate::error::Result;
use crate::response::{created, ok, paged, ApiResponse};
use crate::routes::auth::check_email;
use crate::routes::{required_text, PageParams};
use crate::state::AppState;

/// User routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id/role", patch(change_role))
        .route("/api/users/:id", delete(deactivate_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

async fn list_users(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>> {
    ctx.require_manage_users()?;
    let page = state.store.list_users(ctx.tenant_id, params.request()).await?;
    Ok(paged(page.map(|user| user.profile())))
}

async fn create_user(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    ctx.check_grant(req.role)?;
    let name = required_text(&req.name, "name")?;
    let email = check_email(&req.email)?;
    check_password_policy(&req.password)?;

    let hash = hash_password_blocking(req.password).await?;
    let user = User::new(ctx.tenant_id, &email, name, req.role, hash);
    state.store.create_user(&user).await?;

    tracing::info!(tenant_id = %ctx.tenant_id, user_id = %user.id, role = %user.role, by = %ctx.user_id, "user created");
    Ok(created(user.profile()))
}

async fn change_role(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    ctx.require_manage_users()?;
    let mut target = state.store.get_user(ctx.tenant_id, id).await?;
    let owners = state.store.count_active_owners(ctx.tenant_id).await?;
    ctx.check_role_change(&target, req.role, owners as usize)?;

    let previous = target.role;
    target.role = req.role;
    target.updated_at = Utc::now();
    // Rechecked in the store; the count above may be stale by now.
    state.store.update_user_keeping_owner(&target).await?;

    tracing::info!(
        tenant_id = %ctx.tenant_id,
        user_id = %target.id,
        from = %previous,
        to = %target.role,
        by = %ctx.user_id,
        "role changed"
    );
    Ok(ok(target.profile()))
}

async fn deactivate_user(
    State(state): State<AppState>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    ctx.require_manage_users()?;
    let mut target = state.store.get_user(ctx.tenant_id, id).await?;
    let owners = state.store.count_active_owners(ctx.tenant_id).await?;
    ctx.check_deactivation(&target, owners as usize)?;

    if target.is_active {
        target.is_active = false;
        target.updated_at = Utc::now();
        state.store.update_user_keeping_owner(&target).await?;
        tracing::info!(tenant_id = %ctx.tenant_id, user_id = %target.id, by = %ctx.user_id, "user deactivated");
    }
    Ok(ok(target.profile()))
}
