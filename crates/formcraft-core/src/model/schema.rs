//! Form schema: the ordered field list, layout, and settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::field::FormField;
use super::template::BusinessLogic;
use crate::layout::Layout;

/// Form-wide behaviour settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSettings {
    #[serde(default = "default_submit_label")]
    pub submit_label: String,
    #[serde(default = "default_success_message")]
    pub success_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default = "default_true")]
    pub allow_multiple_submissions: bool,
    /// Submissions are refused after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_at: Option<DateTime<Utc>>,
    /// Category-specific behaviour (scoring, pricing, booking).
    #[serde(default)]
    pub logic: BusinessLogic,
}

fn default_submit_label() -> String {
    "Submit".to_string()
}

fn default_success_message() -> String {
    "Thank you for your response.".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            submit_label: default_submit_label(),
            success_message: default_success_message(),
            redirect_url: None,
            allow_multiple_submissions: true,
            close_at: None,
            logic: BusinessLogic::None,
        }
    }
}

impl FormSettings {
    /// Whether the form is past its closing time.
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.close_at.map(|close| now >= close).unwrap_or(false)
    }
}

/// The JSON structure describing a form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub settings: FormSettings,
}

impl FormSchema {
    /// Create a schema from a flat field list; positions are assigned on migration.
    pub fn from_fields(fields: Vec<FormField>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    /// Set the business logic.
    pub fn with_logic(mut self, logic: BusinessLogic) -> Self {
        self.settings.logic = logic;
        self
    }

    /// Look up a field by id.
    pub fn field(&self, id: Uuid) -> Option<&FormField> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Look up a field by machine name.
    pub fn field_by_name(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that accept answers, in layout order.
    pub fn input_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.field_type.is_input())
    }
}
