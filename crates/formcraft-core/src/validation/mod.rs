//! Form validators.
//!
//! - [`schema`]: structural checks every schema must pass
//! - [`template_rules`]: category-based field rules for templates and published forms
//! - [`submission`]: answer checking and business-logic evaluation

mod report;
pub mod schema;
pub mod submission;
pub mod template_rules;

pub use report::{Issue, ValidationReport};
pub use schema::{is_http_url, validate_for_publish, validate_schema, MAX_POINTS, MAX_PRICE_CENTS};
pub use submission::{evaluate_submission, slot_available};
pub use template_rules::{
    rules_for, validate_business_logic, validate_category_fields, validate_template, CategoryRules,
};
