//! Form field definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layout::Cell;

text_enum! {
    /// Kind of input (or display element) a field renders as.
    pub enum FieldType: "field type" {
        /// Single-line text.
        Text => "text",
        /// Multi-line text.
        Textarea => "textarea",
        /// Email address.
        Email => "email",
        /// Numeric value.
        Number => "number",
        /// Phone number.
        Phone => "phone",
        /// http(s) URL.
        Url => "url",
        /// Calendar date, `YYYY-MM-DD`.
        Date => "date",
        /// Time of day, `HH:MM`.
        Time => "time",
        /// Dropdown, one choice.
        Select => "select",
        /// Radio group, one choice.
        Radio => "radio",
        /// Checkbox group, many choices.
        Checkbox => "checkbox",
        /// Star rating.
        Rating => "rating",
        /// Uploaded file reference.
        File => "file",
        /// Purchasable product with priced options.
        Product => "product",
        /// Payment method or token.
        Payment => "payment",
        /// Section heading, display only.
        Heading => "heading",
        /// Static text, display only.
        Paragraph => "paragraph",
        /// Hidden value set by the embedding page.
        Hidden => "hidden",
    }
}

impl FieldType {
    /// Display-only elements never carry answers.
    pub fn is_display(&self) -> bool {
        matches!(self, FieldType::Heading | FieldType::Paragraph)
    }

    /// Field accepts an answer.
    pub fn is_input(&self) -> bool {
        !self.is_display()
    }

    /// Field answers are picked from `options`.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Radio | FieldType::Checkbox | FieldType::Product
        )
    }

    /// Field accepts more than one option.
    pub fn is_multi_choice(&self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Product)
    }
}

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    /// Text shown to respondents.
    pub label: String,
    /// Value recorded in submissions.
    pub value: String,
    /// Unit price for product options, in minor currency units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    /// Marks the correct answer(s) of a quiz question.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_correct: bool,
}

impl FieldOption {
    /// Create a plain option.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            price_cents: None,
            is_correct: false,
        }
    }

    /// Set the unit price.
    pub fn with_price(mut self, cents: i64) -> Self {
        self.price_cents = Some(cents);
        self
    }

    /// Mark as a correct quiz answer.
    pub fn correct(mut self) -> Self {
        self.is_correct = true;
        self
    }
}

/// Validation rules applied to submitted answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression the whole answer must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
}

/// Where a field sits in the layout grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldPosition {
    pub row: usize,
    pub column: usize,
    #[serde(default)]
    pub sub_column: usize,
    /// Index within the cell.
    #[serde(default)]
    pub order: usize,
}

impl FieldPosition {
    /// Position at `order` within `cell`.
    pub fn new(cell: Cell, order: usize) -> Self {
        Self {
            row: cell.row,
            column: cell.column,
            sub_column: cell.sub_column,
            order,
        }
    }

    /// The cell this position lies in.
    pub fn cell(&self) -> Cell {
        Cell::new(self.row, self.column, self.sub_column)
    }
}

/// A single field of a form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    /// Machine name; answers are keyed by it.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<FieldPosition>,
    /// Quiz points awarded for a fully correct answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
}

impl FormField {
    /// Create an optional field with a fresh id and no position.
    pub fn new(field_type: FieldType, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            field_type,
            label: label.into(),
            name: name.into(),
            placeholder: None,
            help_text: None,
            options: Vec::new(),
            validation: ValidationRules::default(),
            position: None,
            points: None,
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.validation.required = true;
        self
    }

    /// Append an option.
    pub fn with_option(mut self, option: FieldOption) -> Self {
        self.options.push(option);
        self
    }

    /// Append plain options whose value is the label lowercased.
    pub fn with_choices(mut self, labels: &[&str]) -> Self {
        for label in labels {
            let value = label.to_lowercase().replace(' ', "_");
            self.options.push(FieldOption::new(*label, value));
        }
        self
    }

    /// Replace the validation rules.
    pub fn with_validation(mut self, validation: ValidationRules) -> Self {
        self.validation = validation;
        self
    }

    /// Set quiz points.
    pub fn with_points(mut self, points: u32) -> Self {
        self.points = Some(points);
        self
    }

    /// Set the layout position.
    pub fn at(mut self, position: FieldPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Look up an option by value.
    pub fn option(&self, value: &str) -> Option<&FieldOption> {
        self.options.iter().find(|o| o.value == value)
    }
}
