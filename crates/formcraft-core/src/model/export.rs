//! Tool export jobs.
//!
//! A job walks through a fixed list of steps. Its status follows:
//!
//! ```text
//! pending ──> running ──> completed
//!    │           ├──────> failed
//!    └───────────┴──────> cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Steps every export goes through, in order.
pub const EXPORT_STEPS: &[&str] = &[
    "validate_tool",
    "render_schema",
    "bundle_theme",
    "write_manifest",
    "compress_package",
];

text_enum! {
    /// Export job status.
    pub enum ExportStatus: "export status" {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl ExportStatus {
    /// Terminal states never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportStatus::Completed | ExportStatus::Failed | ExportStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: ExportStatus) -> bool {
        use ExportStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

/// Progress record of one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub tool_id: Uuid,
    pub requested_by: Uuid,
    pub status: ExportStatus,
    pub current_step: u32,
    pub total_steps: u32,
    /// Label of the step last started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExportJob {
    /// Create a pending job sized to [`EXPORT_STEPS`].
    pub fn new(tenant_id: Uuid, tool_id: Uuid, requested_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            tool_id,
            requested_by,
            status: ExportStatus::Pending,
            current_step: 0,
            total_steps: EXPORT_STEPS.len() as u32,
            step_label: None,
            package_path: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Completion percentage, rounded down.
    pub fn progress_percent(&self) -> u32 {
        if self.total_steps == 0 {
            return 0;
        }
        self.current_step * 100 / self.total_steps
    }

    fn transition(&mut self, next: ExportStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Pending -> running.
    pub fn start(&mut self) -> Result<()> {
        self.transition(ExportStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Record that a step finished. Only valid while running.
    pub fn advance(&mut self, label: impl Into<String>) -> Result<()> {
        if self.status != ExportStatus::Running {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: "advance".to_string(),
            });
        }
        if self.current_step >= self.total_steps {
            return Err(Error::Validation(format!(
                "export already at final step {}",
                self.total_steps
            )));
        }
        self.current_step += 1;
        self.step_label = Some(label.into());
        Ok(())
    }

    /// Running -> completed. Requires every step done.
    pub fn complete(&mut self, package_path: impl Into<String>) -> Result<()> {
        if self.current_step != self.total_steps {
            return Err(Error::Validation(format!(
                "cannot complete export at step {}/{}",
                self.current_step, self.total_steps
            )));
        }
        self.transition(ExportStatus::Completed)?;
        self.package_path = Some(package_path.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Running -> failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(ExportStatus::Failed)?;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Pending or running -> cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(ExportStatus::Cancelled)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}
