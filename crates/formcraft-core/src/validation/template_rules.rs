//! Category-based template field rules.
//!
//! Every [`TemplateCategory`] has a static [`CategoryRules`] entry naming the
//! field types a form of that kind must contain, the ones it may not
//! contain, and how many input fields it may have. Quiz, e-commerce and
//! appointment templates get additional checks on options and logic.

use super::report::ValidationReport;
use crate::model::{BusinessLogic, FieldType, FormField, FormSchema, TemplateCategory};

/// Field rules for one category.
#[derive(Debug)]
pub struct CategoryRules {
    pub category: TemplateCategory,
    /// Each group must be satisfied by at least one field of a listed type.
    pub required_types: &'static [&'static [FieldType]],
    pub forbidden_types: &'static [FieldType],
    pub min_input_fields: usize,
    pub max_input_fields: Option<usize>,
}

const CHOICE: &[FieldType] = &[FieldType::Radio, FieldType::Select, FieldType::Checkbox];

static RULES: [CategoryRules; 8] = [
    CategoryRules {
        category: TemplateCategory::Poll,
        required_types: &[CHOICE],
        forbidden_types: &[FieldType::Product, FieldType::Payment, FieldType::File],
        min_input_fields: 1,
        max_input_fields: Some(3),
    },
    CategoryRules {
        category: TemplateCategory::Quiz,
        required_types: &[CHOICE],
        forbidden_types: &[FieldType::Product, FieldType::Payment],
        min_input_fields: 1,
        max_input_fields: None,
    },
    CategoryRules {
        category: TemplateCategory::Ecommerce,
        required_types: &[&[FieldType::Product], &[FieldType::Email]],
        forbidden_types: &[],
        min_input_fields: 2,
        max_input_fields: None,
    },
    CategoryRules {
        category: TemplateCategory::Appointment,
        required_types: &[
            &[FieldType::Date],
            &[FieldType::Time],
            &[FieldType::Email, FieldType::Phone],
        ],
        forbidden_types: &[FieldType::Product, FieldType::Payment],
        min_input_fields: 3,
        max_input_fields: None,
    },
    CategoryRules {
        category: TemplateCategory::Survey,
        required_types: &[],
        forbidden_types: &[FieldType::Payment],
        min_input_fields: 1,
        max_input_fields: None,
    },
    CategoryRules {
        category: TemplateCategory::Registration,
        required_types: &[&[FieldType::Email]],
        forbidden_types: &[],
        min_input_fields: 1,
        max_input_fields: None,
    },
    CategoryRules {
        category: TemplateCategory::Contact,
        required_types: &[&[FieldType::Email], &[FieldType::Textarea]],
        forbidden_types: &[FieldType::Product, FieldType::Payment],
        min_input_fields: 2,
        max_input_fields: None,
    },
    CategoryRules {
        category: TemplateCategory::Feedback,
        required_types: &[&[FieldType::Rating, FieldType::Radio, FieldType::Textarea]],
        forbidden_types: &[FieldType::Product, FieldType::Payment],
        min_input_fields: 1,
        max_input_fields: None,
    },
];

/// Rule table entry for `category`.
pub fn rules_for(category: TemplateCategory) -> &'static CategoryRules {
    RULES
        .iter()
        .find(|rules| rules.category == category)
        .unwrap_or(&RULES[0])
}

fn type_list(types: &[FieldType]) -> String {
    types.iter().map(FieldType::as_str).collect::<Vec<_>>().join(" or ")
}

/// Check a schema against its category's field rules.
pub fn validate_category_fields(category: TemplateCategory, schema: &FormSchema) -> ValidationReport {
    let rules = rules_for(category);
    let mut report = ValidationReport::new();
    let inputs: Vec<&FormField> = schema.input_fields().collect();

    for group in rules.required_types {
        if !inputs.iter().any(|f| group.contains(&f.field_type)) {
            report.error(
                "missing_required_field_type",
                None,
                format!("{category} forms need a {} field", type_list(group)),
            );
        }
    }
    for field in &inputs {
        if rules.forbidden_types.contains(&field.field_type) {
            report.error(
                "forbidden_field_type",
                Some(field.id),
                format!("{category} forms cannot contain {} field {:?}", field.field_type, field.name),
            );
        }
    }
    if inputs.len() < rules.min_input_fields {
        report.error(
            "too_few_fields",
            None,
            format!(
                "{category} forms need at least {} input fields, found {}",
                rules.min_input_fields,
                inputs.len()
            ),
        );
    }
    if let Some(max) = rules.max_input_fields {
        if inputs.len() > max {
            report.error(
                "too_many_fields",
                None,
                format!("{category} forms allow at most {max} input fields, found {}", inputs.len()),
            );
        }
    }

    match category {
        TemplateCategory::Quiz => check_quiz_fields(&mut report, &inputs),
        TemplateCategory::Ecommerce => check_product_prices(&mut report, &inputs),
        TemplateCategory::Feedback => {
            if !inputs.iter().any(|f| f.field_type == FieldType::Rating) {
                report.warn("no_rating_field", None, "feedback forms usually include a rating field");
            }
        }
        TemplateCategory::Survey => {
            if inputs.iter().all(|f| !f.validation.required) {
                report.warn("no_required_fields", None, "no survey question is required");
            }
        }
        _ => {}
    }
    report
}

fn check_quiz_fields(report: &mut ValidationReport, inputs: &[&FormField]) {
    for field in inputs.iter().filter(|f| CHOICE.contains(&f.field_type)) {
        if !field.options.iter().any(|o| o.is_correct) {
            report.error(
                "missing_correct_answer",
                Some(field.id),
                format!("quiz question {:?} has no option marked correct", field.name),
            );
        }
        if field.points.is_none() {
            report.error(
                "missing_points",
                Some(field.id),
                format!("quiz question {:?} has no points", field.name),
            );
        }
    }
}

fn check_product_prices(report: &mut ValidationReport, inputs: &[&FormField]) {
    for field in inputs.iter().filter(|f| f.field_type == FieldType::Product) {
        for option in &field.options {
            match option.price_cents {
                Some(price) if price >= 0 => {}
                Some(price) => report.error(
                    "invalid_price",
                    Some(field.id),
                    format!("product {:?} has negative price {price}", option.value),
                ),
                None => report.error(
                    "missing_price",
                    Some(field.id),
                    format!("product {:?} has no price", option.value),
                ),
            }
        }
    }
}

/// Check business logic parameters on their own.
pub fn validate_business_logic(logic: &BusinessLogic) -> ValidationReport {
    let mut report = ValidationReport::new();
    match logic {
        BusinessLogic::None | BusinessLogic::Poll { .. } => {}
        BusinessLogic::Quiz { pass_score_percent, .. } => {
            if *pass_score_percent > 100 {
                report.error(
                    "invalid_pass_score",
                    None,
                    format!("pass score {pass_score_percent}% is above 100%"),
                );
            }
        }
        BusinessLogic::Ecommerce { currency, tax_rate_bps } => {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                report.error(
                    "invalid_currency",
                    None,
                    format!("currency {currency:?} is not a three-letter ISO code"),
                );
            }
            if *tax_rate_bps > 10_000 {
                report.error(
                    "invalid_tax_rate",
                    None,
                    format!("tax rate {tax_rate_bps} bps is above 100%"),
                );
            }
        }
        BusinessLogic::Appointment {
            slot_minutes,
            open_hour,
            close_hour,
        } => {
            if !(5..=240).contains(slot_minutes) {
                report.error(
                    "invalid_slot_length",
                    None,
                    format!("slot length {slot_minutes} minutes is outside 5..=240"),
                );
            }
            if open_hour >= close_hour || *close_hour > 24 {
                report.error(
                    "invalid_opening_hours",
                    None,
                    format!("opening hours {open_hour}..{close_hour} are not a valid range"),
                );
            }
        }
    }
    report
}

/// Full template check: field rules, logic parameters, and logic/category agreement.
pub fn validate_template(
    category: TemplateCategory,
    logic: &BusinessLogic,
    schema: &FormSchema,
) -> ValidationReport {
    let mut report = validate_category_fields(category, schema);
    report.merge(validate_business_logic(logic));
    if let Some(logic_category) = logic.category() {
        if logic_category != category {
            report.error(
                "logic_mismatch",
                None,
                format!("{logic_category} logic cannot be used by a {category} template"),
            );
        }
    }
    tracing::debug!(
        %category,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validated template"
    );
    report
}
