//! HTTP route handlers.

pub mod auth;
pub mod forms;
pub mod health;
pub mod links;
pub mod public;
pub mod templates;
pub mod tenant;
pub mod themes;
pub mod tools;
pub mod users;

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use formcraft_core::{FeatureGate, PageRequest};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// `?page=&per_page=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

/// Tell an absent key (`None`) apart from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Plan gate of the caller's tenant.
pub(crate) async fn feature_gate(state: &AppState, tenant_id: Uuid) -> Result<FeatureGate> {
    let tenant = state.store.get_tenant(tenant_id).await?;
    Ok(FeatureGate::for_tenant(&tenant))
}

/// Trimmed, non-empty text.
pub(crate) fn required_text(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}
