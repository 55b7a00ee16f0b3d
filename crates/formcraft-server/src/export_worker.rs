//! Background tool export jobs.
//!
//! Each job runs as its own tokio task through the fixed [`EXPORT_STEPS`].
//! Progress is persisted after every step. Cancellation is a flag checked
//! between steps; a per-job write lock keeps the worker and a cancel request
//! from persisting over each other.
//!
//! The package is a gzip-compressed JSON document:
//!
//! ```json
//! {
//!   "checksum": "<blake3 hex of payload>",
//!   "payload": {
//!     "format": "formcraft-export/1",
//!     "job_id": "...",
//!     "generated_at": "...",
//!     "tool": { ... },
//!     "form": { "id": "...", "title": "...", "slug": "...", "schema": { ... } },
//!     "theme": { ... }
//!   }
//! }
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use formcraft_core::layout;
use formcraft_core::model::export::EXPORT_STEPS;
use formcraft_core::validation::validate_schema;
use formcraft_core::{ExportJob, FormTheme, ToolRegistryEntry};
use formcraft_store::{Store, StoreError};

use crate::error::AppError;

/// Package format identifier.
pub const PACKAGE_FORMAT: &str = "formcraft-export/1";

/// Why a job stopped before completing.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] formcraft_core::Error),
    #[error("package write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("package encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("packaging task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Default)]
struct JobHandle {
    cancelled: AtomicBool,
    write: Mutex<()>,
}

/// What the worker carries from one step to the next.
#[derive(Default)]
struct Package {
    tool: Option<ToolRegistryEntry>,
    form: Option<Value>,
    theme: Option<FormTheme>,
    document: Option<Vec<u8>>,
    path: Option<PathBuf>,
}

/// Runs export jobs and tracks the ones in flight.
pub struct ExportWorker {
    store: Arc<dyn Store>,
    export_dir: PathBuf,
    step_delay: Duration,
    running: DashMap<Uuid, Arc<JobHandle>>,
}

impl ExportWorker {
    pub fn new(store: Arc<dyn Store>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            export_dir: export_dir.into(),
            step_delay: Duration::ZERO,
            running: DashMap::new(),
        }
    }

    /// Pause between steps.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Number of jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    /// Spawn a task for a persisted pending job.
    pub fn spawn(self: &Arc<Self>, job: ExportJob) {
        let handle = Arc::new(JobHandle::default());
        self.running.insert(job.id, handle.clone());
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            worker.run(job, handle).await;
        });
    }

    /// Cancel a pending or running job of `tenant_id`.
    pub async fn cancel(&self, tenant_id: Uuid, job_id: Uuid) -> Result<ExportJob, AppError> {
        // Tenant check before touching the in-flight handle.
        self.store.get_export(tenant_id, job_id).await?;

        let handle = self.running.get(&job_id).map(|entry| Arc::clone(entry.value()));
        let _guard = match &handle {
            Some(handle) => {
                handle.cancelled.store(true, Ordering::SeqCst);
                Some(handle.write.lock().await)
            }
            None => None,
        };

        // Read after the handle lookup so a job the worker just finished is seen as finished.
        let mut job = self.store.get_export(tenant_id, job_id).await?;
        job.cancel()?;
        self.store.update_export(&job).await?;
        tracing::info!(job_id = %job.id, tenant_id = %tenant_id, step = job.current_step, "export cancelled");
        Ok(job)
    }

    async fn run(self: Arc<Self>, mut job: ExportJob, handle: Arc<JobHandle>) {
        let job_id = job.id;
        tracing::info!(job_id = %job_id, tool_id = %job.tool_id, "export started");

        match self.execute(&mut job, &handle).await {
            Ok(true) => tracing::info!(job_id = %job_id, path = ?job.package_path, "export completed"),
            Ok(false) => tracing::debug!(job_id = %job_id, "export stopped after cancellation"),
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "export failed");
                if let Err(persist) = self.record_failure(&mut job, &handle, &err).await {
                    tracing::error!(job_id = %job_id, error = %persist, "could not record export failure");
                }
            }
        }

        self.running.remove(&job_id);
    }

    /// Returns `Ok(false)` when the job was cancelled.
    async fn execute(&self, job: &mut ExportJob, handle: &JobHandle) -> Result<bool, ExportError> {
        if !self.commit(job, handle, ExportJob::start).await? {
            return Ok(false);
        }

        let mut package = Package::default();
        for (index, step) in EXPORT_STEPS.iter().enumerate() {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            if handle.cancelled.load(Ordering::SeqCst) {
                return Ok(false);
            }
            self.perform(index, job, &mut package).await?;
            if !self.commit(job, handle, |job| job.advance(*step)).await? {
                return Ok(false);
            }
        }

        let path = package
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .ok_or_else(|| ExportError::Invalid("no package was written".to_string()))?;
        self.commit(job, handle, |job| job.complete(path)).await
    }

    async fn perform(&self, index: usize, job: &ExportJob, package: &mut Package) -> Result<(), ExportError> {
        match index {
            0 => {
                let tool = self.store.get_tool(job.tenant_id, job.tool_id).await?;
                let report = tool.validate();
                if !report.is_valid() {
                    return Err(ExportError::Invalid(report.summary()));
                }
                package.tool = Some(tool);
            }
            1 => {
                let form_id = package.tool.as_ref().and_then(|tool| tool.form_id);
                if let Some(form_id) = form_id {
                    let form = self.store.get_form(job.tenant_id, form_id).await?;
                    let (schema, _) = layout::migrate(form.schema.clone());
                    let report = validate_schema(&schema);
                    if !report.is_valid() {
                        return Err(ExportError::Invalid(format!("form schema is invalid: {}", report.summary())));
                    }
                    if let Some(theme_id) = form.theme_id {
                        package.theme = Some(self.store.get_theme(job.tenant_id, theme_id).await?);
                    }
                    package.form = Some(json!({
                        "id": form.id,
                        "title": form.title,
                        "slug": form.slug,
                        "status": form.status,
                        "schema": schema,
                    }));
                }
            }
            2 => {
                if let Some(theme) = &package.theme {
                    let report = theme.validate();
                    if !report.is_valid() {
                        return Err(ExportError::Invalid(format!("theme is invalid: {}", report.summary())));
                    }
                }
            }
            3 => {
                let payload = json!({
                    "format": PACKAGE_FORMAT,
                    "job_id": job.id,
                    "generated_at": Utc::now(),
                    "tool": package.tool,
                    "form": package.form,
                    "theme": package.theme.as_ref().map(|theme| json!({
                        "id": theme.id,
                        "name": theme.name,
                        "desktop": theme.desktop,
                        "mobile": theme.effective_mobile(),
                    })),
                });
                package.document = Some(seal(&payload)?);
            }
            _ => {
                let document = package.document.take().unwrap_or_default();
                let path = self.package_path(job);
                let written = path.clone();
                tokio::task::spawn_blocking(move || write_gzip(&written, &document)).await??;
                package.path = Some(path);
            }
        }
        Ok(())
    }

    /// Apply `change` and persist it unless the job was cancelled.
    async fn commit<F>(&self, job: &mut ExportJob, handle: &JobHandle, change: F) -> Result<bool, ExportError>
    where
        F: FnOnce(&mut ExportJob) -> formcraft_core::Result<()>,
    {
        let _guard = handle.write.lock().await;
        if handle.cancelled.load(Ordering::SeqCst) {
            return Ok(false);
        }
        change(job)?;
        self.store.update_export(job).await?;
        Ok(true)
    }

    async fn record_failure(&self, job: &mut ExportJob, handle: &JobHandle, err: &ExportError) -> Result<(), StoreError> {
        let _guard = handle.write.lock().await;
        if handle.cancelled.load(Ordering::SeqCst) {
            return Ok(());
        }
        if job.fail(err.to_string()).is_err() {
            tracing::warn!(job_id = %job.id, status = %job.status, "export failed outside the running state");
            return Ok(());
        }
        self.store.update_export(job).await
    }

    fn package_path(&self, job: &ExportJob) -> PathBuf {
        self.export_dir
            .join(job.tenant_id.to_string())
            .join(format!("{}.json.gz", job.id))
    }
}

/// Wrap a payload with its blake3 checksum.
fn seal(payload: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let bytes = serde_json::to_vec(payload)?;
    let checksum = blake3::hash(&bytes).to_hex().to_string();
    serde_json::to_vec_pretty(&json!({ "checksum": checksum, "payload": payload }))
}

fn write_gzip(path: &Path, document: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::default());
    encoder.write_all(document)?;
    encoder.finish()?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use flate2::read::GzDecoder;
    use formcraft_core::{ExportStatus, Form, FormField, FormSchema, FieldType, Plan, Role, Tenant, User};
    use formcraft_store::{ExportRepository, FormRepository, MemoryStore, TenantRepository, ToolRepository};

    struct Fixture {
        store: Arc<MemoryStore>,
        tenant: Tenant,
        user: User,
        _dir: tempfile::TempDir,
        dir: PathBuf,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let tenant = Tenant::new("Acme", "acme", Plan::Pro);
        let user = User::new(tenant.id, "owner@acme.io", "Owner", Role::Owner, "hash");
        store.create_tenant_with_owner(&tenant, &user).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        Fixture {
            store,
            tenant,
            user,
            _dir: dir,
            dir: path,
        }
    }

    async fn wait_for_terminal(store: &MemoryStore, tenant_id: Uuid, job_id: Uuid) -> ExportJob {
        for _ in 0..200 {
            let job = store.get_export(tenant_id, job_id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("export {job_id} did not finish");
    }

    async fn pending_job(fx: &Fixture, tool: &ToolRegistryEntry) -> ExportJob {
        fx.store.create_tool(tool).await.unwrap();
        let job = ExportJob::new(fx.tenant.id, tool.id, fx.user.id);
        fx.store.create_export(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_export_writes_package() {
        let fx = fixture().await;
        let schema = FormSchema::from_fields(vec![FormField::new(FieldType::Email, "email", "Email").required()]);
        let form = Form::new(fx.tenant.id, fx.user.id, "Signup", "signup", schema);
        fx.store.create_form(&form).await.unwrap();
        let mut tool = ToolRegistryEntry::new(fx.tenant.id, "Signup Widget", "signup-widget");
        tool.form_id = Some(form.id);
        let job = pending_job(&fx, &tool).await;

        let worker = Arc::new(ExportWorker::new(fx.store.clone(), &fx.dir));
        worker.spawn(job.clone());
        let done = wait_for_terminal(&fx.store, fx.tenant.id, job.id).await;

        assert_eq!(done.status, ExportStatus::Completed);
        assert_eq!(done.current_step, EXPORT_STEPS.len() as u32);
        assert_eq!(done.progress_percent(), 100);

        let path = PathBuf::from(done.package_path.unwrap());
        assert!(path.starts_with(&fx.dir));
        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap()).read_to_string(&mut text).unwrap();
        let document: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["payload"]["format"], PACKAGE_FORMAT);
        assert_eq!(document["payload"]["form"]["slug"], "signup");

        let bytes = serde_json::to_vec(&document["payload"]).unwrap();
        assert_eq!(document["checksum"], blake3::hash(&bytes).to_hex().to_string());
    }

    #[tokio::test]
    async fn test_invalid_tool_fails_job() {
        let fx = fixture().await;
        let mut tool = ToolRegistryEntry::new(fx.tenant.id, "Broken", "broken");
        tool.version = "one".into();
        let job = pending_job(&fx, &tool).await;

        let worker = Arc::new(ExportWorker::new(fx.store.clone(), &fx.dir));
        worker.spawn(job.clone());
        let done = wait_for_terminal(&fx.store, fx.tenant.id, job.id).await;

        assert_eq!(done.status, ExportStatus::Failed);
        assert!(done.error.unwrap().contains("MAJOR.MINOR.PATCH"));
        assert!(done.package_path.is_none());
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let fx = fixture().await;
        let tool = ToolRegistryEntry::new(fx.tenant.id, "Slow", "slow");
        let job = pending_job(&fx, &tool).await;

        let worker = Arc::new(ExportWorker::new(fx.store.clone(), &fx.dir).with_step_delay(Duration::from_millis(50)));
        worker.spawn(job.clone());
        tokio::time::sleep(Duration::from_millis(70)).await;

        let cancelled = worker.cancel(fx.tenant.id, job.id).await.unwrap();
        assert_eq!(cancelled.status, ExportStatus::Cancelled);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let stored = fx.store.get_export(fx.tenant.id, job.id).await.unwrap();
        assert_eq!(stored.status, ExportStatus::Cancelled);
        assert!(stored.current_step < stored.total_steps);
        assert_eq!(worker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_other_tenant_not_found() {
        let fx = fixture().await;
        let tool = ToolRegistryEntry::new(fx.tenant.id, "Slow", "slow");
        let job = pending_job(&fx, &tool).await;

        let worker = Arc::new(ExportWorker::new(fx.store.clone(), &fx.dir).with_step_delay(Duration::from_millis(20)));
        worker.spawn(job.clone());
        assert!(matches!(worker.cancel(Uuid::new_v4(), job.id).await, Err(AppError::NotFound(_))));

        let done = wait_for_terminal(&fx.store, fx.tenant.id, job.id).await;
        assert_eq!(done.status, ExportStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_finished_job_rejected() {
        let fx = fixture().await;
        let tool = ToolRegistryEntry::new(fx.tenant.id, "Fast", "fast");
        let job = pending_job(&fx, &tool).await;

        let worker = Arc::new(ExportWorker::new(fx.store.clone(), &fx.dir));
        worker.spawn(job.clone());
        wait_for_terminal(&fx.store, fx.tenant.id, job.id).await;

        assert!(matches!(
            worker.cancel(fx.tenant.id, job.id).await,
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_racing_completion_never_rewrites_outcome() {
        let fx = fixture().await;
        let worker = Arc::new(ExportWorker::new(fx.store.clone(), &fx.dir));

        for n in 0..20 {
            let tool = ToolRegistryEntry::new(fx.tenant.id, format!("Race {n}"), format!("race-{n}"));
            let job = pending_job(&fx, &tool).await;
            worker.spawn(job.clone());
            if n % 2 == 0 {
                tokio::task::yield_now().await;
            }

            let result = worker.cancel(fx.tenant.id, job.id).await;
            let stored = wait_for_terminal(&fx.store, fx.tenant.id, job.id).await;
            match result {
                Ok(cancelled) => {
                    assert_eq!(cancelled.status, ExportStatus::Cancelled);
                    assert_eq!(stored.status, ExportStatus::Cancelled);
                }
                Err(AppError::InvalidTransition(_)) => assert_eq!(stored.status, ExportStatus::Completed),
                Err(other) => panic!("unexpected cancel error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_after_worker_released_job() {
        let fx = fixture().await;
        let tool = ToolRegistryEntry::new(fx.tenant.id, "Done", "done");
        let mut job = pending_job(&fx, &tool).await;
        job.start().unwrap();
        fx.store.update_export(&job).await.unwrap();
        let stale = job.clone();
        for step in EXPORT_STEPS {
            job.advance(*step).unwrap();
        }
        job.complete("/tmp/done.json.gz").unwrap();
        fx.store.update_export(&job).await.unwrap();

        // No handle is registered, as after the worker removed it.
        let worker = ExportWorker::new(fx.store.clone(), &fx.dir);
        assert!(matches!(
            worker.cancel(fx.tenant.id, job.id).await,
            Err(AppError::InvalidTransition(_))
        ));

        let mut late = stale;
        late.cancel().unwrap();
        assert!(fx.store.update_export(&late).await.is_err());
        let stored = fx.store.get_export(fx.tenant.id, job.id).await.unwrap();
        assert_eq!(stored.status, ExportStatus::Completed);
    }
}
