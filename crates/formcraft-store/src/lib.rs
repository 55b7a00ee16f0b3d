//! Formcraft Store - Persistence for tenants, forms, and everything they own.
//!
//! Two implementations of the repository traits:
//! - [`PgStore`]: PostgreSQL with row-level security keyed on a
//!   transaction-local tenant setting
//! - [`MemoryStore`]: process memory with the same constraint semantics,
//!   for tests and local development

pub mod error;
pub mod memory;
pub mod postgres;
pub mod seed;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::{PgConfig, PgStore, MIGRATOR};
pub use seed::{seed_system_templates, system_templates, SeedReport};
pub use traits::{
    ExportRepository, FormFilter, FormRepository, ShortLinkRepository, Store, SubmissionRepository,
    TemplateRepository, TenantRepository, ThemeRepository, ToolRepository, UserRepository,
};
