//! Submissions collected by published forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Result of scoring a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
    pub earned: u32,
    pub possible: u32,
    pub percent: u32,
    pub passed: bool,
    /// Names of questions answered fully correctly.
    #[serde(default)]
    pub correct_fields: Vec<String>,
}

/// One priced line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub field: String,
    pub value: String,
    pub label: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

/// Totals of an order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub currency: String,
    pub items: Vec<LineItem>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Values derived from the answers by the form's business logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSummary>,
}

/// One response to a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub form_id: Uuid,
    /// Answers keyed by field name.
    pub answers: Map<String, Value>,
    #[serde(default)]
    pub outcome: SubmissionOutcome,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl Submission {
    /// Create a submission stamped now.
    pub fn new(
        tenant_id: Uuid,
        form_id: Uuid,
        answers: Map<String, Value>,
        outcome: SubmissionOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            form_id,
            answers,
            outcome,
            submitted_at: Utc::now(),
            client_ip: None,
        }
    }

    /// Record the client address.
    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }
}
