//! Short links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A short code redirecting to a target URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortLink {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Globally unique code.
    pub code: String,
    pub target_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<Uuid>,
    pub clicks: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ShortLink {
    /// Create a link with no clicks.
    pub fn new(
        tenant_id: Uuid,
        code: impl Into<String>,
        target_url: impl Into<String>,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            code: code.into(),
            target_url: target_url.into(),
            form_id: None,
            clicks: 0,
            expires_at: None,
            created_by,
            created_at: Utc::now(),
        }
    }

    /// Whether the link no longer resolves at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}
