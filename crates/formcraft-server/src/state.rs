use std::sync::Arc;

use formcraft_store::Store;

use crate::auth::JwtKeys;
use crate::config::ServerConfig;
use crate::export_worker::ExportWorker;
use crate::rate_limit::RateLimiter;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<ServerConfig>,
    pub jwt: Arc<JwtKeys>,
    pub limiter: Arc<RateLimiter>,
    pub exports: Arc<ExportWorker>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: ServerConfig) -> Self {
        let jwt = JwtKeys::new(config.jwt_secret.as_bytes(), config.jwt_ttl, config.jwt_issuer.clone());
        let limiter = RateLimiter::per_minute(config.rate_limit_per_minute);
        let exports = ExportWorker::new(store.clone(), config.export_dir.clone());
        Self {
            store,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            limiter: Arc::new(limiter),
            exports: Arc::new(exports),
        }
    }

    /// Replace the export worker, e.g. with one that pauses between steps.
    pub fn with_export_worker(mut self, worker: ExportWorker) -> Self {
        self.exports = Arc::new(worker);
        self
    }

    /// Public URL of a short link code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/s/{code}", self.config.public_base_url)
    }
}
