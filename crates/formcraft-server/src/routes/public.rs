//! Unauthenticated endpoints: published forms, submissions, and short link redirects.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use formcraft_core::layout;
use formcraft_core::validation::evaluate_submission;
use formcraft_core::{
    BusinessLogic, FeatureGate, Form, FormSchema, FormTheme, StyleConfig, Submission, SubmissionOutcome, Tenant,
};

use crate::error::{AppError, Result};
use crate::rate_limit::{ClientIp, RouteClass};
use crate::response::{created, ok, ApiResponse};
use crate::state::AppState;

/// Public routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/public/:tenant/forms/:slug", get(get_public_form))
        .route("/api/public/:tenant/forms/:slug/submissions", post(submit))
        .route("/s/:code", get(follow_link))
}

/// What a respondent needs to render a form.
#[derive(Debug, Serialize)]
pub struct PublicForm {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub slug: String,
    pub schema: FormSchema,
    pub theme: Option<PublicTheme>,
    pub closed: bool,
}

#[derive(Debug, Serialize)]
pub struct PublicTheme {
    pub name: String,
    pub desktop: StyleConfig,
    pub mobile: StyleConfig,
}

impl From<FormTheme> for PublicTheme {
    fn from(theme: FormTheme) -> Self {
        let mobile = theme.effective_mobile();
        Self {
            name: theme.name,
            desktop: theme.desktop,
            mobile,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub answers: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub outcome: SubmissionOutcome,
    pub success_message: String,
    pub redirect_url: Option<String>,
}

/// Resolve a live form; every miss is the same 404.
async fn live_form(state: &AppState, tenant_slug: &str, form_slug: &str) -> Result<(Tenant, Form)> {
    let not_found = || AppError::NotFound("form not found".to_string());
    let tenant = state
        .store
        .find_tenant_by_slug(tenant_slug)
        .await?
        .ok_or_else(not_found)?;
    let form = state
        .store
        .find_published_form(tenant.id, form_slug)
        .await?
        .filter(Form::is_live)
        .ok_or_else(not_found)?;
    Ok((tenant, form))
}

/// The form's own theme, else the tenant default.
async fn form_theme(state: &AppState, form: &Form) -> Result<Option<FormTheme>> {
    if let Some(theme_id) = form.theme_id {
        return Ok(Some(state.store.get_theme(form.tenant_id, theme_id).await?));
    }
    let themes = state.store.list_themes(form.tenant_id).await?;
    Ok(themes.into_iter().find(|theme| theme.is_default))
}

/// Hide which quiz answers were right unless the form reveals them.
fn redact_outcome(mut outcome: SubmissionOutcome, logic: &BusinessLogic) -> SubmissionOutcome {
    let reveal = matches!(logic, BusinessLogic::Quiz { show_correct_answers: true, .. });
    if !reveal {
        if let Some(quiz) = outcome.quiz.as_mut() {
            quiz.correct_fields.clear();
        }
    }
    outcome
}

async fn get_public_form(
    State(state): State<AppState>,
    Path((tenant_slug, form_slug)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PublicForm>>> {
    let (_, form) = live_form(&state, &tenant_slug, &form_slug).await?;
    let theme = form_theme(&state, &form).await?.map(PublicTheme::from);
    let closed = form.schema.settings.is_closed_at(Utc::now());
    let (schema, _) = layout::migrate(form.schema);

    Ok(ok(PublicForm {
        id: form.id,
        title: form.title,
        description: form.description,
        slug: form.slug,
        schema,
        theme,
        closed,
    }))
}

async fn submit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path((tenant_slug, form_slug)): Path<(String, String)>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse> {
    state.limiter.check(&ip, RouteClass::Submission)?;

    let (tenant, form) = live_form(&state, &tenant_slug, &form_slug).await?;
    if form.schema.settings.is_closed_at(Utc::now()) {
        return Err(AppError::Forbidden("form is closed to new submissions".to_string()));
    }

    let existing = state.store.count_submissions(tenant.id, form.id).await?;
    FeatureGate::for_tenant(&tenant).check_submission_quota(existing)?;

    let (report, outcome) = evaluate_submission(&form.schema, &req.answers);
    if !report.is_valid() {
        return Err(AppError::validation(report));
    }

    let submission = Submission::new(tenant.id, form.id, req.answers, outcome).with_client_ip(ip);
    state.store.create_submission(&submission).await?;
    tracing::info!(submission_id = %submission.id, form_id = %form.id, tenant_id = %tenant.id, "submission received");

    let settings = form.schema.settings;
    Ok(created(SubmitResponse {
        id: submission.id,
        submitted_at: submission.submitted_at,
        outcome: redact_outcome(submission.outcome, &settings.logic),
        success_message: settings.success_message,
        redirect_url: settings.redirect_url,
    }))
}

/// 302 to the link target and count the click.
async fn follow_link(State(state): State<AppState>, Path(code): Path<String>) -> Result<Response> {
    let link = state
        .store
        .resolve_link(&code)
        .await?
        .filter(|link| !link.is_expired_at(Utc::now()))
        .ok_or_else(|| AppError::NotFound("link not found".to_string()))?;

    let location = HeaderValue::from_str(&link.target_url)
        .map_err(|e| AppError::Internal(format!("stored link target is not a header value: {e}")))?;
    state.store.record_click(link.id).await?;
    tracing::debug!(code = %link.code, link_id = %link.id, "short link followed");

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
