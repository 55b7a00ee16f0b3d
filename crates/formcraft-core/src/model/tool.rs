//! Tool registry entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationReport;

text_enum! {
    /// Lifecycle of a registered tool.
    pub enum ToolStatus: "tool status" {
        /// Available for export.
        Active => "active",
        /// Kept for history; new exports are refused.
        Deprecated => "deprecated",
    }
}

/// A registered, exportable packaging of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRegistryEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `MAJOR.MINOR.PATCH`.
    pub version: String,
    /// Free-form tool configuration copied into the export manifest.
    #[serde(default)]
    pub config: serde_json::Value,
    pub status: ToolStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolRegistryEntry {
    /// Create an active tool at version 0.1.0.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            form_id: None,
            name: name.into(),
            slug: slug.into(),
            description: None,
            version: "0.1.0".to_string(),
            config: serde_json::Value::Object(Default::default()),
            status: ToolStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check name and version format.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        if self.name.trim().is_empty() {
            report.error("tool_name_empty", None, "tool name must not be empty");
        }
        if !is_semver(&self.version) {
            report.error(
                "invalid_version",
                None,
                format!("version must be MAJOR.MINOR.PATCH, got {:?}", self.version),
            );
        }
        if !self.config.is_object() {
            report.error("invalid_config", None, "tool config must be a JSON object");
        }
        report
    }
}

/// Three dot-separated non-negative integers without leading zeros.
pub fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.chars().all(|c| c.is_ascii_digit())
                && (p.len() == 1 || !p.starts_with('0'))
        })
}
