//! Store error types.

use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No visible row matched.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint was violated.
    #[error("{0}")]
    Conflict(String),

    /// A foreign key pointed at a missing row.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// A check constraint rejected the row.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The row reached a final state and may no longer change.
    #[error("{0} already finished")]
    Finished(&'static str),

    /// The write would leave the tenant without an active owner.
    #[error("tenant must keep at least one active owner")]
    LastOwner,

    /// A stored value could not be decoded into the domain model.
    #[error("decode error: {0}")]
    Decode(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Human message for a unique-constraint name.
pub(crate) fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("tenants_slug_key") => "tenant slug is already taken".to_string(),
        Some("users_tenant_email_key") => "a user with this email already exists".to_string(),
        Some("forms_tenant_slug_key") => "a form with this slug already exists".to_string(),
        Some("themes_tenant_name_key") => "a theme with this name already exists".to_string(),
        Some("themes_one_default_key") => "tenant already has a default theme".to_string(),
        Some("templates_tenant_name_key") => "a template with this name already exists".to_string(),
        Some("tools_tenant_slug_key") => "a tool with this slug already exists".to_string(),
        Some("short_links_code_key") => "short link code is already in use".to_string(),
        Some(other) => format!("duplicate value violates {other}"),
        None => "duplicate value".to_string(),
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let code = db.code().map(|c| c.into_owned());
            match code.as_deref() {
                Some("23505") => return StoreError::Conflict(conflict_message(db.constraint())),
                Some("23503") => {
                    return StoreError::InvalidReference(db.constraint().unwrap_or("foreign key").to_string())
                }
                Some("23514") | Some("22P02") => return StoreError::InvalidData(db.message().to_string()),
                _ => {}
            }
        }
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Decode(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

impl From<formcraft_core::Error> for StoreError {
    fn from(err: formcraft_core::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}
