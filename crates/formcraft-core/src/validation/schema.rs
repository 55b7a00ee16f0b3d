//! Structural checks that apply to every form schema.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::report::ValidationReport;
use super::template_rules::{validate_business_logic, validate_category_fields};
use crate::model::{FieldType, FormField, FormSchema, TemplateCategory};

/// Most quiz points a single question may award.
pub const MAX_POINTS: u32 = 10_000;
/// Highest unit price of a product option, in cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

fn field_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("static regex"))
}

/// Whether `url` is an absolute http(s) URL without whitespace.
pub fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => !rest.is_empty() && !rest.starts_with('/') && !url.chars().any(char::is_whitespace),
        None => false,
    }
}

/// Check field identity, options, rules, layout, and settings.
pub fn validate_schema(schema: &FormSchema) -> ValidationReport {
    let mut report = ValidationReport::new();

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for field in &schema.fields {
        if !ids.insert(field.id) {
            report.error("duplicate_field_id", Some(field.id), format!("field id {} appears twice", field.id));
        }
        if !names.insert(field.name.as_str()) {
            report.error(
                "duplicate_field_name",
                Some(field.id),
                format!("field name {:?} appears twice", field.name),
            );
        }
        check_field(&mut report, field);
    }

    if let Err(err) = schema.layout.check() {
        report.error("invalid_layout", None, err.to_string());
    }
    for field in &schema.fields {
        match field.position {
            None => report.error(
                "field_unpositioned",
                Some(field.id),
                format!("field {:?} has no layout position", field.name),
            ),
            Some(position) if !schema.layout.contains(position.cell()) => report.error(
                "field_outside_layout",
                Some(field.id),
                format!(
                    "field {:?} is placed at row {} column {} sub-column {}, which does not exist",
                    field.name, position.row, position.column, position.sub_column
                ),
            ),
            Some(_) => {}
        }
    }

    if let Some(url) = &schema.settings.redirect_url {
        if !is_http_url(url) {
            report.error("invalid_redirect_url", None, "redirect_url must be an http(s) URL");
        }
    }
    if schema.settings.submit_label.trim().is_empty() {
        report.error("submit_label_empty", None, "submit label must not be empty");
    }
    report.merge(validate_business_logic(&schema.settings.logic));

    if schema.input_fields().next().is_none() {
        report.warn("no_input_fields", None, "form has no fields that accept answers");
    }
    report
}

/// Checks run before a form goes live.
///
/// Adds the category rules when the form came from a template, and
/// requires at least one input field.
pub fn validate_for_publish(schema: &FormSchema, category: Option<TemplateCategory>) -> ValidationReport {
    let mut report = validate_schema(schema);
    if schema.input_fields().next().is_none() {
        report.error("no_input_fields", None, "a published form needs at least one input field");
    }
    if let Some(category) = category {
        report.merge(validate_category_fields(category, schema));
    }
    report
}

fn check_field(report: &mut ValidationReport, field: &FormField) {
    let id = Some(field.id);

    if !field_name_regex().is_match(&field.name) {
        report.error(
            "invalid_field_name",
            id,
            format!(
                "field name {:?} must start with a lowercase letter and contain only a-z, 0-9, _",
                field.name
            ),
        );
    }
    if field.field_type.is_input() && field.label.trim().is_empty() {
        report.error("label_empty", id, format!("field {:?} needs a label", field.name));
    }

    if field.field_type.is_choice() {
        if field.options.is_empty() {
            report.error("options_missing", id, format!("field {:?} needs at least one option", field.name));
        }
        let mut values = HashSet::new();
        for option in &field.options {
            if option.value.trim().is_empty() {
                report.error("option_value_empty", id, format!("field {:?} has an option without a value", field.name));
            } else if !values.insert(option.value.as_str()) {
                report.error(
                    "duplicate_option_value",
                    id,
                    format!("field {:?} repeats option value {:?}", field.name, option.value),
                );
            }
        }
    } else if !field.options.is_empty() {
        report.warn(
            "options_ignored",
            id,
            format!("options on {} field {:?} are ignored", field.field_type, field.name),
        );
    }

    if let Some(points) = field.points {
        if points > MAX_POINTS {
            report.error(
                "points_out_of_range",
                id,
                format!("field {:?} awards {points} points, at most {MAX_POINTS} allowed", field.name),
            );
        }
    }
    if field.field_type == FieldType::Product {
        for option in &field.options {
            match option.price_cents {
                Some(price) if price < 0 => report.error(
                    "invalid_price",
                    id,
                    format!("product {:?} has negative price {price}", option.value),
                ),
                Some(price) if price > MAX_PRICE_CENTS => report.error(
                    "price_out_of_range",
                    id,
                    format!("product {:?} costs {price} cents, at most {MAX_PRICE_CENTS} allowed", option.value),
                ),
                _ => {}
            }
        }
    }

    let rules = &field.validation;
    if let (Some(min), Some(max)) = (rules.min, rules.max) {
        if min > max {
            report.error("invalid_range", id, format!("field {:?} has min {min} above max {max}", field.name));
        }
    }
    if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
        if min > max {
            report.error(
                "invalid_length",
                id,
                format!("field {:?} has min_length {min} above max_length {max}", field.name),
            );
        }
    }
    if let (Some(min), Some(max)) = (rules.min_selections, rules.max_selections) {
        if min > max {
            report.error(
                "invalid_selection_range",
                id,
                format!("field {:?} has min_selections {min} above max_selections {max}", field.name),
            );
        }
    }
    if let Some(max) = rules.max_selections {
        if field.field_type.is_choice() && !field.options.is_empty() && max > field.options.len() {
            report.warn(
                "selection_limit_unreachable",
                id,
                format!("field {:?} allows {max} selections but has {} options", field.name, field.options.len()),
            );
        }
    }
    if let Some(pattern) = &rules.pattern {
        if let Err(err) = Regex::new(pattern) {
            report.error("invalid_pattern", id, format!("field {:?} pattern does not compile: {err}", field.name));
        }
    }
    if rules.required && field.field_type.is_display() {
        report.warn(
            "required_display_field",
            id,
            format!("display field {:?} cannot be required", field.name),
        );
    }
}
