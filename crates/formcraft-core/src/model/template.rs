//! Form templates and category business logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::FormSchema;

text_enum! {
    /// Template category; drives the field rules in `validation::template_rules`.
    pub enum TemplateCategory: "template category" {
        Poll => "poll",
        Quiz => "quiz",
        Ecommerce => "ecommerce",
        Appointment => "appointment",
        Survey => "survey",
        Registration => "registration",
        Contact => "contact",
        Feedback => "feedback",
    }
}

/// Category-specific behaviour evaluated on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusinessLogic {
    /// Plain data collection.
    None,
    /// Single-question vote.
    Poll {
        #[serde(default)]
        show_results: bool,
    },
    /// Scored questionnaire.
    Quiz {
        pass_score_percent: u8,
        #[serde(default)]
        show_correct_answers: bool,
    },
    /// Order form with priced products.
    Ecommerce {
        /// ISO 4217 code.
        currency: String,
        /// Tax rate in basis points (825 = 8.25%).
        #[serde(default)]
        tax_rate_bps: u32,
    },
    /// Booking with fixed slots inside opening hours.
    Appointment {
        slot_minutes: u32,
        open_hour: u8,
        close_hour: u8,
    },
}

impl Default for BusinessLogic {
    fn default() -> Self {
        BusinessLogic::None
    }
}

impl BusinessLogic {
    /// The category this logic belongs to, if it is category-specific.
    pub fn category(&self) -> Option<TemplateCategory> {
        match self {
            BusinessLogic::None => None,
            BusinessLogic::Poll { .. } => Some(TemplateCategory::Poll),
            BusinessLogic::Quiz { .. } => Some(TemplateCategory::Quiz),
            BusinessLogic::Ecommerce { .. } => Some(TemplateCategory::Ecommerce),
            BusinessLogic::Appointment { .. } => Some(TemplateCategory::Appointment),
        }
    }
}

/// A reusable starting point for new forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub id: Uuid,
    /// `None` for system templates shared by every tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: TemplateCategory,
    #[serde(default)]
    pub business_logic: BusinessLogic,
    /// Seed schema copied into forms created from this template.
    pub schema: FormSchema,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormTemplate {
    /// Create a template.
    pub fn new(
        tenant_id: Option<Uuid>,
        name: impl Into<String>,
        category: TemplateCategory,
        business_logic: BusinessLogic,
        schema: FormSchema,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            description: None,
            category,
            business_logic,
            schema,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this is a shared system template.
    pub fn is_system(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Schema for a new form: fresh field ids and the template's logic in settings.
    pub fn instantiate_schema(&self) -> FormSchema {
        let mut schema = self.schema.clone();
        for field in &mut schema.fields {
            field.id = Uuid::new_v4();
        }
        for row in &mut schema.layout.rows {
            row.id = Uuid::new_v4();
        }
        schema.settings.logic = self.business_logic.clone();
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, FormField};

    #[test]
    fn test_logic_serde_tagged() {
        let logic = BusinessLogic::Ecommerce {
            currency: "EUR".into(),
            tax_rate_bps: 2000,
        };
        let json = serde_json::to_value(&logic).unwrap();
        assert_eq!(json["kind"], "ecommerce");
        let back: BusinessLogic = serde_json::from_value(json).unwrap();
        assert_eq!(back, logic);

        let none: BusinessLogic = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(none, BusinessLogic::None);
    }

    #[test]
    fn test_instantiate_refreshes_ids() {
        let field = FormField::new(FieldType::Email, "email", "Email");
        let original_id = field.id;
        let template = FormTemplate::new(
            None,
            "Contact",
            TemplateCategory::Contact,
            BusinessLogic::None,
            FormSchema::from_fields(vec![field]),
        );
        let schema = template.instantiate_schema();
        assert_ne!(schema.fields[0].id, original_id);
        assert_eq!(schema.fields[0].name, "email");
        assert!(template.is_system());
    }
}
