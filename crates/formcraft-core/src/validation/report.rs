//! Validation findings.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A single finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Stable machine-readable code.
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<Uuid>,
    pub message: String,
}

/// Errors block an action; warnings are advisory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, code: &'static str, field_id: Option<Uuid>, message: impl Into<String>) {
        self.errors.push(Issue {
            code,
            field_id,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, code: &'static str, field_id: Option<Uuid>, message: impl Into<String>) {
        self.warnings.push(Issue {
            code,
            field_id,
            message: message.into(),
        });
    }

    /// Append another report's findings.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether an error with `code` was reported.
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|issue| issue.code == code)
    }

    /// One line summarizing the errors.
    pub fn summary(&self) -> String {
        let messages: Vec<&str> = self.errors.iter().map(|i| i.message.as_str()).collect();
        match messages.len() {
            0 => "no errors".to_string(),
            1 => messages[0].to_string(),
            n => format!("{n} errors: {}", messages.join("; ")),
        }
    }

    /// `Err(Error::Validation)` if any error was reported.
    pub fn into_result(self) -> Result<ValidationReport> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::Validation(self.summary()))
        }
    }
}
