//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use formcraft_core::Plan;

/// Shortest accepted JWT secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Formcraft API server command line arguments.
#[derive(Debug, Parser)]
#[command(name = "formcraft-server")]
#[command(about = "Multi-tenant form builder API")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to listen on for HTTP requests.
    #[arg(short, long, env = "FORMCRAFT_LISTEN", default_value = "0.0.0.0:8080", global = true)]
    pub listen: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    #[arg(long, env = "FORMCRAFT_DB_MAX_CONNECTIONS", default_value_t = 10, global = true)]
    pub db_max_connections: u32,

    /// Timeout (ms) when acquiring a pooled connection.
    #[arg(long, env = "FORMCRAFT_DB_ACQUIRE_TIMEOUT_MS", default_value_t = 5_000, global = true)]
    pub db_acquire_timeout_ms: u64,

    /// HMAC secret for signing access tokens. At least 32 bytes.
    #[arg(long, env = "FORMCRAFT_JWT_SECRET", hide_env_values = true, global = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in seconds.
    #[arg(long, env = "FORMCRAFT_JWT_TTL_SECS", default_value_t = 86_400, global = true)]
    pub jwt_ttl_secs: u64,

    /// Issuer claim written into and required from tokens.
    #[arg(long, env = "FORMCRAFT_JWT_ISSUER", default_value = "formcraft", global = true)]
    pub jwt_issuer: String,

    /// Directory export packages are written to.
    #[arg(long, env = "FORMCRAFT_EXPORT_DIR", default_value = "./exports", global = true)]
    pub export_dir: PathBuf,

    /// Requests per minute per client on rate-limited routes.
    #[arg(long, env = "FORMCRAFT_RATE_LIMIT_PER_MINUTE", default_value_t = 60, global = true)]
    pub rate_limit_per_minute: u32,

    /// Base URL used to build short link URLs.
    #[arg(long, env = "FORMCRAFT_PUBLIC_BASE_URL", default_value = "http://localhost:8080", global = true)]
    pub public_base_url: String,

    /// Key rate limits on the first `X-Forwarded-For` hop. Only enable behind a proxy that sets it.
    #[arg(long, env = "FORMCRAFT_TRUST_FORWARDED_FOR", global = true)]
    pub trust_forwarded_for: bool,

    /// Log filter directive.
    #[arg(long, env = "FORMCRAFT_LOG", default_value = "formcraft_server=info,tower_http=info", global = true)]
    pub log: String,
}

/// Subcommands. `serve` is the default.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Apply migrations, insert the system templates, and exit.
    Seed,
    /// Move a tenant to another plan, optionally clearing its feature overrides.
    SetPlan {
        /// Tenant slug.
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        plan: Plan,
        #[arg(long)]
        clear_overrides: bool,
    },
}

/// Configuration errors caught before startup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL is required")]
    MissingDatabaseUrl,
    #[error("FORMCRAFT_JWT_SECRET is required")]
    MissingJwtSecret,
    #[error("FORMCRAFT_JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes, got {0}")]
    WeakJwtSecret(usize),
    #[error("rate limit must be at least 1 request per minute")]
    ZeroRateLimit,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub db_max_connections: u32,
    /// Timeout when acquiring a pooled connection.
    pub db_acquire_timeout: Duration,
    /// HMAC secret for access tokens.
    pub jwt_secret: String,
    /// Access token lifetime.
    pub jwt_ttl: Duration,
    /// Token issuer.
    pub jwt_issuer: String,
    /// Directory export packages are written to.
    pub export_dir: PathBuf,
    /// Requests per minute per client on rate-limited routes.
    pub rate_limit_per_minute: u32,
    /// Base URL for short links, without trailing slash.
    pub public_base_url: String,
    /// Whether `X-Forwarded-For` identifies the client.
    pub trust_forwarded_for: bool,
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            database_url: args.database_url.clone(),
            db_max_connections: args.db_max_connections,
            db_acquire_timeout: Duration::from_millis(args.db_acquire_timeout_ms),
            jwt_secret: args.jwt_secret.clone().unwrap_or_default(),
            jwt_ttl: Duration::from_secs(args.jwt_ttl_secs),
            jwt_issuer: args.jwt_issuer.clone(),
            export_dir: args.export_dir.clone(),
            rate_limit_per_minute: args.rate_limit_per_minute,
            public_base_url: args.public_base_url.trim_end_matches('/').to_string(),
            trust_forwarded_for: args.trust_forwarded_for,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(5),
            jwt_secret: String::new(),
            jwt_ttl: Duration::from_secs(86_400),
            jwt_issuer: "formcraft".to_string(),
            export_dir: PathBuf::from("./exports"),
            rate_limit_per_minute: 60,
            public_base_url: "http://localhost:8080".to_string(),
            trust_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    /// Checks needed by `serve`.
    pub fn validate_for_serve(&self) -> Result<(), ConfigError> {
        self.database_url()?;
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakJwtSecret(self.jwt_secret.len()));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        Ok(())
    }

    /// The database URL, required by every subcommand.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or(ConfigError::MissingDatabaseUrl)
    }
}
