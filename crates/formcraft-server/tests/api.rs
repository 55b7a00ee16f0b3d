//! HTTP API tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use formcraft_server::{create_router, AppState, ServerConfig};
use formcraft_core::Plan;
use formcraft_store::{seed_system_templates, MemoryStore, TenantRepository};

const SECRET: &str = "test-secret-test-secret-test-secret";

struct TestApp {
    server: TestServer,
    store: Arc<MemoryStore>,
    _exports: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let exports = tempfile::tempdir().unwrap();
        let mut config = ServerConfig {
            jwt_secret: SECRET.to_string(),
            export_dir: exports.path().to_path_buf(),
            public_base_url: "https://forms.test".to_string(),
            rate_limit_per_minute: 1_000,
            ..Default::default()
        };
        adjust(&mut config);

        let store = Arc::new(MemoryStore::new());
        seed_system_templates(store.as_ref()).await.unwrap();

        let state = AppState::new(store.clone(), config);
        let server = TestServer::new(create_router(state)).unwrap();
        Self {
            server,
            store,
            _exports: exports,
        }
    }

    /// Change a tenant's plan the way the `set-plan` command does.
    async fn set_plan(&self, slug: &str, plan: Plan) {
        let mut tenant = self.store.find_tenant_by_slug(slug).await.unwrap().unwrap();
        tenant.plan = plan;
        self.store.update_tenant(&tenant).await.unwrap();
    }

    /// Register a tenant and return the owner's token.
    async fn register(&self, slug: &str) -> String {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({
                "tenant_name": format!("{slug} Inc"),
                "tenant_slug": slug,
                "name": "Owner",
                "email": format!("owner@{slug}.io"),
                "password": "correct horse battery",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["data"]["token"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn login(&self, tenant: &str, email: &str, password: &str) -> TestResponse {
        self.server
            .post("/api/auth/login")
            .json(&json!({ "tenant": tenant, "email": email, "password": password }))
            .await
    }

    async fn get(&self, token: &str, path: &str) -> TestResponse {
        self.server.get(path).add_header(header::AUTHORIZATION, bearer(token)).await
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> TestResponse {
        self.server
            .post(path)
            .add_header(header::AUTHORIZATION, bearer(token))
            .json(&body)
            .await
    }

    async fn put(&self, token: &str, path: &str, body: Value) -> TestResponse {
        self.server
            .put(path)
            .add_header(header::AUTHORIZATION, bearer(token))
            .json(&body)
            .await
    }

    async fn patch(&self, token: &str, path: &str, body: Value) -> TestResponse {
        self.server
            .patch(path)
            .add_header(header::AUTHORIZATION, bearer(token))
            .json(&body)
            .await
    }

    async fn delete(&self, token: &str, path: &str) -> TestResponse {
        self.server.delete(path).add_header(header::AUTHORIZATION, bearer(token)).await
    }

    /// Create a form and return its JSON.
    async fn create_form(&self, token: &str, body: Value) -> Value {
        let response = self.post(token, "/api/forms", body).await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["data"].clone()
    }

    /// Create a user in the caller's tenant and return a token for them.
    async fn add_user(&self, owner: &str, tenant: &str, email: &str, role: &str) -> (String, String) {
        let created = self
            .post(
                owner,
                "/api/users",
                json!({ "email": email, "name": "Member", "role": role, "password": "member password" }),
            )
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();

        let login = self.login(tenant, email, "member password").await;
        login.assert_status_ok();
        let token = login.json::<Value>()["data"]["token"]["token"].as_str().unwrap().to_string();
        (id, token)
    }
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn error_code(response: &TestResponse) -> String {
    let body = response.json::<Value>();
    assert_eq!(body["success"], false);
    body["error"]["code"].as_str().unwrap().to_string()
}

fn contact_schema() -> Value {
    json!({
        "fields": [
            { "type": "text", "name": "name", "label": "Name", "validation": { "required": true } },
            { "type": "email", "name": "email", "label": "Email", "validation": { "required": true } }
        ]
    })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["backend"], "memory");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;

    let me = app.get(&token, "/api/auth/me").await;
    me.assert_status_ok();
    let body = me.json::<Value>();
    assert_eq!(body["data"]["user"]["email"], "owner@acme.io");
    assert_eq!(body["data"]["user"]["role"], "owner");
    assert!(body["data"]["user"].get("password_hash").is_none());
    assert_eq!(body["data"]["tenant"]["plan"], "free");
    assert_eq!(body["data"]["features"]["custom_themes"], false);

    let login = app.login("acme", "OWNER@acme.io", "correct horse battery").await;
    login.assert_status_ok();
    assert!(login.json::<Value>()["data"]["user"]["last_login_at"].is_string());

    let wrong = app.login("acme", "owner@acme.io", "wrong password").await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&wrong), "UNAUTHORIZED");

    let unknown = app.login("nobody", "owner@acme.io", "correct horse battery").await;
    unknown.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_taken_slug_and_weak_password() {
    let app = TestApp::new().await;
    app.register("acme").await;

    let again = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "tenant_name": "Acme Again",
            "tenant_slug": "acme",
            "name": "Other",
            "email": "other@acme.io",
            "password": "long enough password",
        }))
        .await;
    again.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&again), "CONFLICT");

    let weak = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "tenant_name": "Weak",
            "name": "Weak",
            "email": "weak@weak.io",
            "password": "short",
        }))
        .await;
    weak.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_without_valid_token_rejected() {
    let app = TestApp::new().await;
    let missing = app.server.get("/api/forms").await;
    missing.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&missing), "UNAUTHORIZED");

    let garbage = app.get("not-a-jwt", "/api/forms").await;
    garbage.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_form_slugs_get_numeric_suffix() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;

    let first = app.create_form(&token, json!({ "title": "Customer Survey" })).await;
    let second = app.create_form(&token, json!({ "title": "Customer Survey" })).await;
    assert_eq!(first["slug"], "customer-survey");
    assert_eq!(second["slug"], "customer-survey-2");
    assert_eq!(first["status"], "draft");

    let explicit = app
        .post(&token, "/api/forms", json!({ "title": "Other", "slug": "Not A Slug" }))
        .await;
    explicit.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_forms_filters_and_paginates() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;
    app.create_form(&token, json!({ "title": "Alpha Survey" })).await;
    app.create_form(&token, json!({ "title": "Beta Poll" })).await;
    app.create_form(&token, json!({ "title": "Gamma Survey" })).await;

    let surveys = app.get(&token, "/api/forms?search=survey").await;
    surveys.assert_status_ok();
    let body = surveys.json::<Value>();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], 2);

    let page = app.get(&token, "/api/forms?per_page=2&page=2").await.json::<Value>();
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["pagination"]["total_pages"], 2);

    let published = app.get(&token, "/api/forms?status=published").await.json::<Value>();
    assert_eq!(published["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_free_plan_form_quota() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;
    for n in 0..5 {
        app.create_form(&token, json!({ "title": format!("Form {n}") })).await;
    }
    let sixth = app.post(&token, "/api/forms", json!({ "title": "One too many" })).await;
    sixth.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(error_code(&sixth), "PLAN_RESTRICTED");
}

#[tokio::test]
async fn test_publish_submit_and_analytics() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;

    let empty = app.create_form(&token, json!({ "title": "Empty" })).await;
    let rejected = app
        .post(&token, &format!("/api/forms/{}/publish", empty["id"].as_str().unwrap()), json!({}))
        .await;
    rejected.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&rejected), "VALIDATION_ERROR");
    assert!(!rejected.json::<Value>()["error"]["details"].as_array().unwrap().is_empty());

    let form = app
        .create_form(&token, json!({ "title": "Contact", "schema": contact_schema() }))
        .await;
    let id = form["id"].as_str().unwrap();
    assert!(form["schema"]["fields"][0]["position"].is_object());

    let draft = app.server.get("/api/public/acme/forms/contact").await;
    draft.assert_status(StatusCode::NOT_FOUND);

    let published = app.post(&token, &format!("/api/forms/{id}/publish"), json!({})).await;
    published.assert_status_ok();
    assert_eq!(published.json::<Value>()["data"]["status"], "published");

    let public = app.server.get("/api/public/acme/forms/contact").await;
    public.assert_status_ok();
    assert_eq!(public.json::<Value>()["data"]["closed"], false);

    let invalid = app
        .server
        .post("/api/public/acme/forms/contact/submissions")
        .json(&json!({ "answers": { "name": "Ada", "email": "not-an-email" } }))
        .await;
    invalid.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&invalid), "VALIDATION_ERROR");

    let submitted = app
        .server
        .post("/api/public/acme/forms/contact/submissions")
        .json(&json!({ "answers": { "name": "Ada", "email": "ada@example.com" } }))
        .await;
    submitted.assert_status(StatusCode::CREATED);
    assert_eq!(
        submitted.json::<Value>()["data"]["success_message"],
        "Thank you for your response."
    );

    let submissions = app.get(&token, &format!("/api/forms/{id}/submissions")).await;
    submissions.assert_status_ok();
    let body = submissions.json::<Value>();
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["answers"]["email"], "ada@example.com");

    let analytics = app.get(&token, &format!("/api/forms/{id}/analytics?days=7")).await;
    analytics.assert_status_ok();
    let body = analytics.json::<Value>();
    assert_eq!(body["data"]["total_submissions"], 1);
    assert_eq!(body["data"]["daily"].as_array().unwrap().len(), 7);

    let archived = app.post(&token, &format!("/api/forms/{id}/archive"), json!({})).await;
    archived.assert_status_ok();
    let gone = app.server.get("/api/public/acme/forms/contact").await;
    gone.assert_status(StatusCode::NOT_FOUND);

    let illegal = app.post(&token, &format!("/api/forms/{id}/publish"), json!({})).await;
    illegal.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&illegal), "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_form_from_poll_template() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;

    let templates = app.get(&token, "/api/templates?category=poll").await.json::<Value>();
    let template = &templates["data"][0];
    assert_eq!(template["name"], "Quick Poll");
    assert!(template["tenant_id"].is_null());

    let form = app
        .create_form(
            &token,
            json!({ "title": "Roadmap vote", "template_id": template["id"] }),
        )
        .await;
    assert_eq!(form["template_id"], template["id"]);
    assert_eq!(form["schema"]["settings"]["logic"]["kind"], "poll");
    let id = form["id"].as_str().unwrap();

    app.post(&token, &format!("/api/forms/{id}/publish"), json!({}))
        .await
        .assert_status_ok();

    let vote = app
        .server
        .post("/api/public/acme/forms/roadmap-vote/submissions")
        .json(&json!({ "answers": { "choice": "dark_mode" } }))
        .await;
    vote.assert_status(StatusCode::CREATED);

    let analytics = app.get(&token, &format!("/api/forms/{id}/analytics")).await.json::<Value>();
    assert_eq!(analytics["data"]["choices"]["choice"]["dark_mode"], 1);
}

#[tokio::test]
async fn test_published_settings_stay_publishable() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;
    let form = app
        .create_form(&token, json!({ "title": "Contact", "schema": contact_schema() }))
        .await;
    let id = form["id"].as_str().unwrap();
    app.post(&token, &format!("/api/forms/{id}/publish"), json!({}))
        .await
        .assert_status_ok();

    let quiz = json!({ "settings": { "logic": { "kind": "quiz", "pass_score_percent": 50 } } });
    let rejected = app.patch(&token, &format!("/api/forms/{id}"), quiz.clone()).await;
    rejected.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&rejected), "VALIDATION_ERROR");
    let stored = app.get(&token, &format!("/api/forms/{id}")).await.json::<Value>();
    assert_eq!(stored["data"]["schema"]["settings"]["logic"]["kind"], "none");

    let relabel = app
        .patch(&token, &format!("/api/forms/{id}"), json!({ "settings": { "submit_label": "Send" } }))
        .await;
    relabel.assert_status_ok();

    // Drafts are only checked at publication.
    app.post(&token, &format!("/api/forms/{id}/unpublish"), json!({}))
        .await
        .assert_status_ok();
    app.patch(&token, &format!("/api/forms/{id}"), quiz)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_template_validation() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;

    let dry_run = app
        .post(
            &token,
            "/api/templates/validate",
            json!({ "name": "Bad poll", "category": "poll", "schema": { "fields": [] } }),
        )
        .await;
    dry_run.assert_status_ok();
    let body = dry_run.json::<Value>();
    assert_eq!(body["data"]["valid"], false);
    assert!(!body["data"]["errors"].as_array().unwrap().is_empty());

    let rejected = app
        .post(
            &token,
            "/api/templates",
            json!({ "name": "Bad poll", "category": "poll", "schema": { "fields": [] } }),
        )
        .await;
    rejected.assert_status(StatusCode::BAD_REQUEST);

    let created = app
        .post(
            &token,
            "/api/templates",
            json!({
                "name": "Team contact",
                "category": "contact",
                "schema": {
                    "fields": [
                        { "type": "email", "name": "email", "label": "Email", "validation": { "required": true } },
                        { "type": "textarea", "name": "message", "label": "Message" }
                    ]
                }
            }),
        )
        .await;
    created.assert_status(StatusCode::CREATED);

    let other = app.register("globex").await;
    let id = created.json::<Value>()["data"]["id"].as_str().unwrap().to_string();
    app.get(&other, &format!("/api/templates/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_layout_operation() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;
    let form = app
        .create_form(&token, json!({ "title": "Layout", "schema": contact_schema() }))
        .await;
    let id = form["id"].as_str().unwrap();

    let resized = app
        .post(
            &token,
            &format!("/api/forms/{id}/layout"),
            json!({ "op": "set_row_columns", "row": 0, "columns": 2 }),
        )
        .await;
    resized.assert_status_ok();
    let body = resized.json::<Value>();
    assert_eq!(body["data"]["op"], "set_row_columns");
    assert_eq!(body["data"]["form"]["schema"]["layout"]["rows"][0]["columns"].as_array().unwrap().len(), 2);

    let added = app
        .post(
            &token,
            &format!("/api/forms/{id}/layout"),
            json!({
                "op": "add_field",
                "field": { "type": "phone", "name": "phone", "label": "Phone" },
                "target": { "row": 0, "column": 1, "sub_column": 0 }
            }),
        )
        .await;
    added.assert_status_ok();
    let fields = added.json::<Value>()["data"]["form"]["schema"]["fields"].clone();
    let phone = fields
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "phone")
        .unwrap()
        .clone();
    assert_eq!(phone["position"]["row"], 0);
    assert_eq!(phone["position"]["column"], 1);

    let bad = app
        .post(
            &token,
            &format!("/api/forms/{id}/layout"),
            json!({ "op": "set_row_columns", "row": 0, "columns": 9 }),
        )
        .await;
    bad.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tenant_isolation() {
    let app = TestApp::new().await;
    let acme = app.register("acme").await;
    let globex = app.register("globex").await;

    let form = app.create_form(&acme, json!({ "title": "Secret" })).await;
    let id = form["id"].as_str().unwrap();

    app.get(&globex, &format!("/api/forms/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.delete(&globex, &format!("/api/forms/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let listed = app.get(&globex, "/api/forms").await.json::<Value>();
    assert_eq!(listed["pagination"]["total"], 0);

    app.get(&acme, &format!("/api/forms/{id}")).await.assert_status_ok();
}

#[tokio::test]
async fn test_role_permissions() {
    let app = TestApp::new().await;
    let owner = app.register("acme").await;
    let (_, editor) = app.add_user(&owner, "acme", "editor@acme.io", "editor").await;
    let (_, viewer) = app.add_user(&owner, "acme", "viewer@acme.io", "viewer").await;

    let owners_form = app.create_form(&owner, json!({ "title": "Owner form" })).await;
    let id = owners_form["id"].as_str().unwrap();

    let edit = app.patch(&editor, &format!("/api/forms/{id}"), json!({ "title": "Hijacked" })).await;
    edit.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(error_code(&edit), "FORBIDDEN");

    let own = app.create_form(&editor, json!({ "title": "Editor form" })).await;
    app.patch(&editor, &format!("/api/forms/{}", own["id"].as_str().unwrap()), json!({ "title": "Renamed" }))
        .await
        .assert_status_ok();

    app.post(&viewer, "/api/forms", json!({ "title": "Nope" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.get(&viewer, &format!("/api/forms/{id}")).await.assert_status_ok();

    app.patch(&editor, "/api/tenant", json!({ "name": "Renamed" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.get(&editor, "/api/users").await.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_changes_and_last_owner() {
    let app = TestApp::new().await;
    let owner = app.register("acme").await;
    let me = app.get(&owner, "/api/auth/me").await.json::<Value>();
    let owner_id = me["data"]["user"]["id"].as_str().unwrap().to_string();

    let (admin_id, admin) = app.add_user(&owner, "acme", "admin@acme.io", "admin").await;

    let own_role = app
        .patch(&owner, &format!("/api/users/{owner_id}/role"), json!({ "role": "admin" }))
        .await;
    own_role.assert_status(StatusCode::FORBIDDEN);

    let grant = app
        .post(
            &admin,
            "/api/users",
            json!({ "email": "x@acme.io", "name": "X", "role": "owner", "password": "member password" }),
        )
        .await;
    grant.assert_status(StatusCode::FORBIDDEN);

    let demote_owner = app
        .patch(&admin, &format!("/api/users/{owner_id}/role"), json!({ "role": "editor" }))
        .await;
    demote_owner.assert_status(StatusCode::FORBIDDEN);

    let demoted = app
        .patch(&owner, &format!("/api/users/{admin_id}/role"), json!({ "role": "editor" }))
        .await;
    demoted.assert_status_ok();
    assert_eq!(demoted.json::<Value>()["data"]["role"], "editor");

    let deactivated = app.delete(&owner, &format!("/api/users/{admin_id}")).await;
    deactivated.assert_status_ok();
    assert_eq!(deactivated.json::<Value>()["data"]["is_active"], false);

    app.get(&admin, "/api/auth/me").await.assert_status(StatusCode::UNAUTHORIZED);
    app.login("acme", "admin@acme.io", "member password")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let users = app.get(&owner, "/api/users").await.json::<Value>();
    assert_eq!(users["pagination"]["total"], 2);
}

#[tokio::test]
async fn test_themes_require_plan() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;

    let free = app.post(&token, "/api/themes", json!({ "name": "Brand" })).await;
    free.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(error_code(&free), "PLAN_RESTRICTED");

    let self_upgrade = app.patch(&token, "/api/tenant", json!({ "plan": "pro" })).await;
    self_upgrade.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    app.patch(&token, "/api/tenant", json!({ "features": { "custom_themes": true } }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let tenant = app.get(&token, "/api/tenant").await.json::<Value>();
    assert_eq!(tenant["data"]["plan"], "free");
    assert_eq!(tenant["data"]["effective_features"]["custom_themes"], false);

    app.set_plan("acme", Plan::Pro).await;
    let upgraded = app.get(&token, "/api/tenant").await.json::<Value>();
    assert_eq!(upgraded["data"]["effective_features"]["custom_themes"], true);

    let first = app
        .post(
            &token,
            "/api/themes",
            json!({ "name": "Brand", "is_default": true, "mobile": { "font_size_px": 14 } }),
        )
        .await;
    first.assert_status(StatusCode::CREATED);
    assert_eq!(first.json::<Value>()["data"]["effective_mobile"]["font_size_px"], 14);

    let second = app
        .post(&token, "/api/themes", json!({ "name": "Night", "is_default": true }))
        .await;
    second.assert_status(StatusCode::CREATED);

    let themes = app.get(&token, "/api/themes").await.json::<Value>();
    let defaults: Vec<&Value> = themes["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| t["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["name"], "Night");

    let bad_color = app
        .post(
            &token,
            "/api/themes",
            json!({ "name": "Broken", "desktop": {
                "primary_color": "blue", "background_color": "#fff", "text_color": "#000",
                "font_family": "Inter", "font_size_px": 16, "border_radius_px": 4,
                "spacing_px": 8, "button_style": "filled"
            } }),
        )
        .await;
    bad_color.assert_status(StatusCode::BAD_REQUEST);

    let duplicate = app.post(&token, "/api/themes", json!({ "name": "Brand" })).await;
    duplicate.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_tool_export_lifecycle() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;
    let form = app
        .create_form(&token, json!({ "title": "Signup", "schema": contact_schema() }))
        .await;

    let tool = app
        .post(
            &token,
            "/api/tools",
            json!({ "name": "Signup Widget", "version": "1.2.0", "form_id": form["id"] }),
        )
        .await;
    tool.assert_status(StatusCode::CREATED);
    let tool = tool.json::<Value>()["data"].clone();
    assert_eq!(tool["slug"], "signup-widget");
    let tool_id = tool["id"].as_str().unwrap();

    let bad_version = app
        .post(&token, "/api/tools", json!({ "name": "Other", "version": "v1" }))
        .await;
    bad_version.assert_status(StatusCode::BAD_REQUEST);

    let free = app.post(&token, &format!("/api/tools/{tool_id}/exports"), json!({})).await;
    free.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(error_code(&free), "PLAN_RESTRICTED");

    app.set_plan("acme", Plan::Pro).await;

    let started = app.post(&token, &format!("/api/tools/{tool_id}/exports"), json!({})).await;
    started.assert_status(StatusCode::CREATED);
    let job = started.json::<Value>()["data"].clone();
    assert_eq!(job["total_steps"], 5);
    let job_id = job["id"].as_str().unwrap();

    let mut finished = Value::Null;
    for _ in 0..200 {
        let polled = app.get(&token, &format!("/api/exports/{job_id}")).await.json::<Value>();
        if polled["data"]["status"] == "completed" || polled["data"]["status"] == "failed" {
            finished = polled["data"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(finished["status"], "completed", "{finished}");
    assert_eq!(finished["progress_percent"], 100);
    assert!(finished["package_path"].as_str().unwrap().ends_with(".json.gz"));

    let listed = app
        .get(&token, &format!("/api/exports?tool_id={tool_id}"))
        .await
        .json::<Value>();
    assert_eq!(listed["pagination"]["total"], 1);

    let cancel = app.post(&token, &format!("/api/exports/{job_id}/cancel"), json!({})).await;
    cancel.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&cancel), "INVALID_TRANSITION");

    app.delete(&token, &format!("/api/tools/{tool_id}"))
        .await
        .assert_status_ok();
    app.get(&token, &format!("/api/exports/{job_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_links() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;

    let created = app
        .post(
            &token,
            "/api/links",
            json!({ "target_url": "https://example.com/landing", "alias": "launch" }),
        )
        .await;
    created.assert_status(StatusCode::CREATED);
    let link = created.json::<Value>()["data"].clone();
    assert_eq!(link["short_url"], "https://forms.test/s/launch");

    let redirect = app.server.get("/s/launch").await;
    redirect.assert_status(StatusCode::FOUND);
    assert_eq!(redirect.header(header::LOCATION), "https://example.com/landing");

    let listed = app.get(&token, "/api/links").await.json::<Value>();
    assert_eq!(listed["data"][0]["clicks"], 1);

    let taken = app
        .post(&token, "/api/links", json!({ "target_url": "https://example.com", "alias": "launch" }))
        .await;
    taken.assert_status(StatusCode::CONFLICT);

    let reserved = app
        .post(&token, "/api/links", json!({ "target_url": "https://example.com", "alias": "admin" }))
        .await;
    reserved.assert_status(StatusCode::BAD_REQUEST);

    let unsafe_target = app
        .post(&token, "/api/links", json!({ "target_url": "javascript:alert(1)" }))
        .await;
    unsafe_target.assert_status(StatusCode::BAD_REQUEST);

    let random = app
        .post(&token, "/api/links", json!({ "target_url": "https://example.com" }))
        .await;
    random.assert_status(StatusCode::CREATED);
    assert_eq!(random.json::<Value>()["data"]["code"].as_str().unwrap().len(), 7);

    let other = app.register("globex").await;
    let link_id = link["id"].as_str().unwrap();
    app.delete(&other, &format!("/api/links/{link_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.delete(&token, &format!("/api/links/{link_id}"))
        .await
        .assert_status_ok();
    app.server.get("/s/launch").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_link_defaults_to_public_form_url() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;
    let form = app.create_form(&token, json!({ "title": "Signup" })).await;

    let created = app.post(&token, "/api/links", json!({ "form_id": form["id"] })).await;
    created.assert_status(StatusCode::CREATED);
    assert_eq!(
        created.json::<Value>()["data"]["target_url"],
        "https://forms.test/api/public/acme/forms/signup"
    );
}

#[tokio::test]
async fn test_schema_replacement_and_duplicate() {
    let app = TestApp::new().await;
    let token = app.register("acme").await;
    let form = app.create_form(&token, json!({ "title": "Signup" })).await;
    let id = form["id"].as_str().unwrap();

    let replaced = app.put(&token, &format!("/api/forms/{id}/schema"), contact_schema()).await;
    replaced.assert_status_ok();
    assert_eq!(replaced.json::<Value>()["data"]["schema"]["fields"].as_array().unwrap().len(), 2);

    let invalid = app
        .put(
            &token,
            &format!("/api/forms/{id}/schema"),
            json!({ "fields": [{ "type": "text", "name": "Bad Name", "label": "X" }] }),
        )
        .await;
    invalid.assert_status(StatusCode::BAD_REQUEST);

    let copy = app.post(&token, &format!("/api/forms/{id}/duplicate"), json!({})).await;
    copy.assert_status(StatusCode::CREATED);
    let copy = copy.json::<Value>()["data"].clone();
    assert_eq!(copy["title"], "Signup (copy)");
    assert_eq!(copy["slug"], "signup-2");
    assert_eq!(copy["status"], "draft");

    app.delete(&token, &format!("/api/forms/{id}")).await.assert_status_ok();
    app.get(&token, &format!("/api/forms/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let reused = app.create_form(&token, json!({ "title": "Signup" })).await;
    assert_eq!(reused["slug"], "signup");
}

#[tokio::test]
async fn test_auth_routes_rate_limited() {
    let app = TestApp::with_config(|config| {
        config.rate_limit_per_minute = 2;
        config.trust_forwarded_for = true;
    })
    .await;
    let forwarded = HeaderName::from_static("x-forwarded-for");

    for _ in 0..2 {
        app.server
            .post("/api/auth/login")
            .add_header(forwarded.clone(), HeaderValue::from_static("203.0.113.9"))
            .json(&json!({ "tenant": "acme", "email": "a@acme.io", "password": "whatever!" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let limited = app
        .server
        .post("/api/auth/login")
        .add_header(forwarded.clone(), HeaderValue::from_static("203.0.113.9"))
        .json(&json!({ "tenant": "acme", "email": "a@acme.io", "password": "whatever!" }))
        .await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&limited), "RATE_LIMITED");
    assert!(limited.headers().get(header::RETRY_AFTER).is_some());

    app.server
        .post("/api/auth/login")
        .add_header(forwarded, HeaderValue::from_static("198.51.100.7"))
        .json(&json!({ "tenant": "acme", "email": "a@acme.io", "password": "whatever!" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_untrusted_forwarded_for_cannot_dodge_limit() {
    let app = TestApp::with_config(|config| config.rate_limit_per_minute = 2).await;
    let forwarded = HeaderName::from_static("x-forwarded-for");

    let mut statuses = Vec::new();
    for n in 0..3 {
        let response = app
            .server
            .post("/api/auth/login")
            .add_header(forwarded.clone(), HeaderValue::from_str(&format!("203.0.113.{n}")).unwrap())
            .json(&json!({ "tenant": "acme", "email": "a@acme.io", "password": "whatever!" }))
            .await;
        statuses.push(response.status_code());
    }
    assert_eq!(
        statuses,
        vec![StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED, StatusCode::TOO_MANY_REQUESTS]
    );
}
