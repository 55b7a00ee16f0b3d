//! Registration, login, and the current user.

use axum::{extract::State, response::IntoResponse, routing::{get, post}, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use formcraft_core::slug::{is_valid_slug, slugify};
use formcraft_core::{normalize_email, Plan, Role, Tenant, TenantFeatures, User, UserProfile};

use crate::auth::{check_password_policy, hash_password_blocking, verify_password_blocking, AuthUser, IssuedToken};
use crate::error::{AppError, Result};
use crate::rate_limit::{ClientIp, RouteClass};
use crate::response::{created, ok, ApiResponse};
use crate::routes::required_text;
use crate::state::AppState;

/// Authentication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub tenant_name: String,
    /// Defaults to the slugified tenant name.
    pub tenant_slug: Option<String>,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Tenant slug.
    pub tenant: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: IssuedToken,
    pub user: UserProfile,
    pub tenant: Tenant,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
    pub tenant: Tenant,
    pub features: TenantFeatures,
}

/// Minimal shape check; the address is never mailed.
pub(crate) fn check_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(format!("{email:?} is not a valid email address")));
    }
    Ok(email)
}

/// Create a tenant on the free plan together with its owner.
async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    state.limiter.check(&ip, RouteClass::Auth)?;

    let tenant_name = required_text(&req.tenant_name, "tenant name")?;
    let name = required_text(&req.name, "name")?;
    let email = check_email(&req.email)?;
    check_password_policy(&req.password)?;

    let slug = match req.tenant_slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => slug.to_string(),
        Some(slug) => {
            return Err(AppError::BadRequest(format!(
                "tenant slug {slug:?} may only contain lowercase letters, digits, and single dashes"
            )));
        }
        None => slugify(&tenant_name),
    };

    let hash = hash_password_blocking(req.password).await?;
    let tenant = Tenant::new(tenant_name, slug, Plan::Free);
    let owner = User::new(tenant.id, &email, name, Role::Owner, hash);
    state.store.create_tenant_with_owner(&tenant, &owner).await?;

    tracing::info!(tenant_id = %tenant.id, slug = %tenant.slug, user_id = %owner.id, "tenant registered");

    let token = state.jwt.issue(&owner)?;
    Ok(created(AuthResponse {
        token,
        user: owner.profile(),
        tenant,
    }))
}

/// Exchange tenant, email, and password for a token.
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    state.limiter.check(&ip, RouteClass::Auth)?;

    let invalid = || AppError::Unauthorized("invalid credentials".to_string());
    let tenant_slug = req.tenant.trim().to_ascii_lowercase();

    let Some(tenant) = state.store.find_tenant_by_slug(&tenant_slug).await? else {
        tracing::warn!(tenant = %tenant_slug, client = %ip, "login for unknown tenant");
        return Err(invalid());
    };
    let Some(mut user) = state
        .store
        .find_user_by_email(tenant.id, &normalize_email(&req.email))
        .await?
    else {
        tracing::warn!(tenant_id = %tenant.id, client = %ip, "login for unknown email");
        return Err(invalid());
    };

    if !verify_password_blocking(req.password, user.password_hash.clone()).await? {
        tracing::warn!(tenant_id = %tenant.id, user_id = %user.id, client = %ip, "login with wrong password");
        return Err(invalid());
    }
    if !user.is_active {
        tracing::warn!(tenant_id = %tenant.id, user_id = %user.id, "login by deactivated user");
        return Err(AppError::Unauthorized("account is deactivated".to_string()));
    }

    let now = Utc::now();
    state.store.record_login(tenant.id, user.id, now).await?;
    user.last_login_at = Some(now);

    tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "user logged in");

    let token = state.jwt.issue(&user)?;
    Ok(ok(AuthResponse {
        token,
        user: user.profile(),
        tenant,
    }))
}

async fn me(State(state): State<AppState>, AuthUser(ctx): AuthUser) -> Result<Json<ApiResponse<MeResponse>>> {
    let user = state.store.get_user(ctx.tenant_id, ctx.user_id).await?;
    let tenant = state.store.get_tenant(ctx.tenant_id).await?;
    let features = tenant.effective_features();
    Ok(ok(MeResponse {
        user: user.profile(),
        tenant,
        features,
    }))
}
