//! PostgreSQL repository tests.
//!
//! Run against a scratch database: `DATABASE_URL=postgres://... cargo test`.
//! Every test returns early when `DATABASE_URL` is unset.

use formcraft_core::{
    ExportJob, Form, FormSchema, FormStatus, FormTheme, PageRequest, Plan, Role, ShortLink, StyleConfig,
    Tenant, ToolRegistryEntry, User,
};
use formcraft_store::{
    seed_system_templates, ExportRepository, FormFilter, FormRepository, PgConfig, PgStore,
    ShortLinkRepository, Store, StoreError, TemplateRepository, TenantRepository, ThemeRepository,
    ToolRepository, UserRepository,
};
use uuid::Uuid;

struct TestContext {
    store: PgStore,
    tenant: Tenant,
    owner: User,
}

impl TestContext {
    async fn new() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PgStore::connect(&PgConfig::new(url).with_max_connections(4))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        let (tenant, owner) = new_tenant(&store).await;
        Some(Self { store, tenant, owner })
    }
}

async fn new_tenant(store: &PgStore) -> (Tenant, User) {
    let slug = format!("t-{}", &Uuid::new_v4().simple().to_string()[..12]);
    let tenant = Tenant::new("Test Tenant", slug, Plan::Pro);
    let owner = User::new(tenant.id, "owner@example.com", "Owner", Role::Owner, "hash");
    store.create_tenant_with_owner(&tenant, &owner).await.unwrap();
    (tenant, owner)
}

#[tokio::test]
async fn test_tenant_and_owner_round_trip() {
    let Some(ctx) = TestContext::new().await else { return };
    ctx.store.ping().await.unwrap();

    let found = ctx.store.find_tenant_by_slug(&ctx.tenant.slug).await.unwrap().unwrap();
    assert_eq!(found.id, ctx.tenant.id);
    assert_eq!(found.plan, Plan::Pro);

    let owner = ctx
        .store
        .find_user_by_email(ctx.tenant.id, "OWNER@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.id, ctx.owner.id);
    assert_eq!(ctx.store.count_active_owners(ctx.tenant.id).await.unwrap(), 1);

    let mut tenant = found;
    tenant.name = "Renamed".into();
    tenant.features.max_forms = Some(3);
    let updated = ctx.store.update_tenant(&tenant).await.unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.features.max_forms, Some(3));
}

#[tokio::test]
async fn test_concurrent_owner_demotions_keep_one_owner() {
    let Some(ctx) = TestContext::new().await else { return };
    let second = User::new(ctx.tenant.id, "second@example.com", "Second", Role::Owner, "hash");
    ctx.store.create_user(&second).await.unwrap();

    let mut first = ctx.owner.clone();
    first.role = Role::Editor;
    let mut other = second.clone();
    other.role = Role::Editor;
    let (a, b) = tokio::join!(
        ctx.store.update_user_keeping_owner(&first),
        ctx.store.update_user_keeping_owner(&other),
    );

    assert!(a.is_ok() != b.is_ok());
    assert!(matches!(a.err().or(b.err()), Some(StoreError::LastOwner)));
    assert_eq!(ctx.store.count_active_owners(ctx.tenant.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_tenant_slug_conflicts() {
    let Some(ctx) = TestContext::new().await else { return };
    let tenant = Tenant::new("Copy", ctx.tenant.slug.clone(), Plan::Free);
    let owner = User::new(tenant.id, "copy@example.com", "Copy", Role::Owner, "hash");
    let err = ctx.store.create_tenant_with_owner(&tenant, &owner).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(msg) if msg.contains("slug")));
    // The owner insert rolled back with the tenant.
    assert!(ctx.store.get_user(tenant.id, owner.id).await.is_err());
}

#[tokio::test]
async fn test_forms_are_tenant_scoped() {
    let Some(ctx) = TestContext::new().await else { return };
    let (other, _) = new_tenant(&ctx.store).await;

    let form = Form::new(ctx.tenant.id, ctx.owner.id, "Feedback", "feedback", FormSchema::default());
    ctx.store.create_form(&form).await.unwrap();

    assert!(ctx.store.get_form(ctx.tenant.id, form.id).await.is_ok());
    assert!(matches!(
        ctx.store.get_form(other.id, form.id).await,
        Err(StoreError::NotFound(_))
    ));
    let listed = ctx
        .store
        .list_forms(other.id, &FormFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(listed.total, 0);
}

#[tokio::test]
async fn test_form_slug_reusable_after_soft_delete() {
    let Some(ctx) = TestContext::new().await else { return };
    let form = Form::new(ctx.tenant.id, ctx.owner.id, "Signup", "signup", FormSchema::default());
    ctx.store.create_form(&form).await.unwrap();

    let clash = Form::new(ctx.tenant.id, ctx.owner.id, "Signup 2", "signup", FormSchema::default());
    assert!(matches!(ctx.store.create_form(&clash).await, Err(StoreError::Conflict(_))));

    ctx.store.soft_delete_form(ctx.tenant.id, form.id).await.unwrap();
    assert!(!ctx.store.form_slug_exists(ctx.tenant.id, "signup").await.unwrap());
    ctx.store.create_form(&clash).await.unwrap();
}

#[tokio::test]
async fn test_list_forms_filters() {
    let Some(ctx) = TestContext::new().await else { return };
    let mut published = Form::new(ctx.tenant.id, ctx.owner.id, "Launch survey", "launch", FormSchema::default());
    published.transition(FormStatus::Published).unwrap();
    ctx.store.create_form(&published).await.unwrap();
    let draft = Form::new(ctx.tenant.id, ctx.owner.id, "100% draft", "draft", FormSchema::default());
    ctx.store.create_form(&draft).await.unwrap();

    let filter = FormFilter {
        status: Some(FormStatus::Published),
        search: None,
    };
    let page = ctx.store.list_forms(ctx.tenant.id, &filter, PageRequest::default()).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, published.id);

    let filter = FormFilter {
        status: None,
        search: Some("100%".into()),
    };
    let page = ctx.store.list_forms(ctx.tenant.id, &filter, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, draft.id);

    let found = ctx.store.find_published_form(ctx.tenant.id, "launch").await.unwrap();
    assert!(found.is_some());
    assert!(ctx.store.find_published_form(ctx.tenant.id, "draft").await.unwrap().is_none());
}

#[tokio::test]
async fn test_theme_default_moves() {
    let Some(ctx) = TestContext::new().await else { return };
    let mut light = FormTheme::new(ctx.tenant.id, "Light", StyleConfig::default());
    light.is_default = true;
    ctx.store.create_theme(&light).await.unwrap();
    let mut dark = FormTheme::new(ctx.tenant.id, "Dark", StyleConfig::default());
    dark.is_default = true;
    ctx.store.create_theme(&dark).await.unwrap();

    let themes = ctx.store.list_themes(ctx.tenant.id).await.unwrap();
    assert_eq!(themes.iter().filter(|t| t.is_default).count(), 1);
    assert_eq!(themes[0].id, dark.id);

    ctx.store.delete_theme(ctx.tenant.id, light.id).await.unwrap();
    assert!(matches!(
        ctx.store.delete_theme(ctx.tenant.id, light.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_export_progress_persists() {
    let Some(ctx) = TestContext::new().await else { return };
    let tool = ToolRegistryEntry::new(ctx.tenant.id, "Widget", "widget");
    ctx.store.create_tool(&tool).await.unwrap();

    let mut job = ExportJob::new(ctx.tenant.id, tool.id, ctx.owner.id);
    ctx.store.create_export(&job).await.unwrap();
    job.start().unwrap();
    job.advance("validate_tool").unwrap();
    ctx.store.update_export(&job).await.unwrap();

    let stored = ctx.store.get_export(ctx.tenant.id, job.id).await.unwrap();
    assert_eq!(stored.current_step, 1);
    assert_eq!(stored.step_label.as_deref(), Some("validate_tool"));

    let page = ctx
        .store
        .list_exports(ctx.tenant.id, Some(tool.id), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_finished_export_rejects_late_writes() {
    let Some(ctx) = TestContext::new().await else { return };
    let tool = ToolRegistryEntry::new(ctx.tenant.id, "Widget", "widget");
    ctx.store.create_tool(&tool).await.unwrap();

    let mut job = ExportJob::new(ctx.tenant.id, tool.id, ctx.owner.id);
    ctx.store.create_export(&job).await.unwrap();
    job.start().unwrap();
    let mut stale = job.clone();
    job.fail("boom").unwrap();
    ctx.store.update_export(&job).await.unwrap();

    stale.cancel().unwrap();
    let err = ctx.store.update_export(&stale).await.unwrap_err();
    assert!(matches!(err, StoreError::Finished(_)));
    let stored = ctx.store.get_export(ctx.tenant.id, job.id).await.unwrap();
    assert_eq!(stored.status.as_str(), "failed");

    let mut missing = ExportJob::new(ctx.tenant.id, tool.id, ctx.owner.id);
    missing.start().unwrap();
    assert!(matches!(ctx.store.update_export(&missing).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_short_links() {
    let Some(ctx) = TestContext::new().await else { return };
    let code = format!("c{}", &Uuid::new_v4().simple().to_string()[..8]);
    let link = ShortLink::new(ctx.tenant.id, code.clone(), "https://example.com/x", ctx.owner.id);
    ctx.store.create_link(&link).await.unwrap();

    let clash = ShortLink::new(ctx.tenant.id, code.clone(), "https://example.com/y", ctx.owner.id);
    assert!(matches!(ctx.store.create_link(&clash).await, Err(StoreError::Conflict(_))));

    ctx.store.record_click(link.id).await.unwrap();
    let resolved = ctx.store.resolve_link(&code).await.unwrap().unwrap();
    assert_eq!(resolved.clicks, 1);

    let (other, _) = new_tenant(&ctx.store).await;
    assert!(matches!(
        ctx.store.delete_link(other.id, link.id).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let Some(ctx) = TestContext::new().await else { return };
    let first = seed_system_templates(&ctx.store).await.unwrap();
    assert_eq!(first.inserted + first.skipped, 8);
    let second = seed_system_templates(&ctx.store).await.unwrap();
    assert_eq!(second.inserted, 0);

    let templates = ctx.store.list_templates(ctx.tenant.id, None).await.unwrap();
    assert!(templates.iter().filter(|t| t.is_system()).count() >= 8);
}
