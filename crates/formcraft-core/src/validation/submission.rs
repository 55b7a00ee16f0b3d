//! Validation and evaluation of public form answers.
//!
//! Answers arrive as a JSON object keyed by field name. Every input field
//! is type checked against its [`ValidationRules`]; answers for display
//! fields are ignored and answers for unknown names are rejected. The
//! form's [`BusinessLogic`] then derives a [`SubmissionOutcome`]: a quiz
//! score, an order summary, or an appointment slot check.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime, Timelike};
use regex::Regex;
use serde_json::{Map, Value};

use super::report::ValidationReport;
use super::schema::is_http_url;
use crate::model::{
    BusinessLogic, FieldType, FormField, FormSchema, LineItem, OrderSummary, QuizScore,
    SubmissionOutcome, ValidationRules,
};

/// Currency used for orders on forms without e-commerce logic.
pub const DEFAULT_CURRENCY: &str = "USD";
/// Upper bound on a single product line.
pub const MAX_QUANTITY: u64 = 999;
const DEFAULT_RATING_MAX: f64 = 5.0;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 ().\-]{5,19}$").expect("static regex"))
}

/// A product selection parsed from an answer.
#[derive(Debug, Clone, PartialEq)]
struct ProductPick {
    value: String,
    quantity: u32,
}

/// Answers of one field after type checking.
enum Parsed<'a> {
    Choices(BTreeSet<&'a str>),
    Products(Vec<ProductPick>),
    Time(NaiveTime),
    Other,
}

/// Validate `answers` against `schema` and compute the business-logic outcome.
///
/// The outcome only reflects answers that passed validation; callers must
/// reject the submission when the report has errors.
pub fn evaluate_submission(
    schema: &FormSchema,
    answers: &Map<String, Value>,
) -> (ValidationReport, SubmissionOutcome) {
    let mut report = ValidationReport::new();

    for name in answers.keys() {
        if schema.field_by_name(name).is_none() {
            report.error("unknown_field", None, format!("form has no field named {name:?}"));
        }
    }

    let mut parsed: Vec<(&FormField, Parsed<'_>)> = Vec::new();
    for field in schema.input_fields() {
        let answer = answers.get(&field.name).filter(|v| !is_blank(v));
        match answer {
            None => {
                if field.validation.required {
                    report.error(
                        "required",
                        Some(field.id),
                        format!("{} is required", display_name(field)),
                    );
                }
            }
            Some(value) => {
                if let Some(result) = check_answer(&mut report, field, value) {
                    parsed.push((field, result));
                }
            }
        }
    }

    let outcome = derive_outcome(&mut report, schema, &parsed);
    (report, outcome)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn display_name(field: &FormField) -> &str {
    if field.label.trim().is_empty() {
        &field.name
    } else {
        &field.label
    }
}

/// Type check one answer; `None` when it was rejected.
fn check_answer<'a>(
    report: &mut ValidationReport,
    field: &'a FormField,
    value: &Value,
) -> Option<Parsed<'a>> {
    let errors_before = report.errors.len();
    let id = Some(field.id);
    let label = display_name(field);

    let parsed = match field.field_type {
        FieldType::Heading | FieldType::Paragraph => Parsed::Other,
        FieldType::Number | FieldType::Rating => {
            let Some(number) = as_number(value) else {
                report.error("invalid_type", id, format!("{label} must be a number"));
                return None;
            };
            check_number(report, field, number);
            Parsed::Other
        }
        FieldType::Select | FieldType::Radio => {
            let Some(choice) = value.as_str() else {
                report.error("invalid_type", id, format!("{label} must be a single option"));
                return None;
            };
            match field.option(choice) {
                Some(option) => Parsed::Choices(BTreeSet::from([option.value.as_str()])),
                None => {
                    report.error("invalid_option", id, format!("{choice:?} is not an option of {label}"));
                    return None;
                }
            }
        }
        FieldType::Checkbox => {
            let Some(picked) = check_choices(report, field, value) else {
                return None;
            };
            check_selection_count(report, field, picked.len());
            Parsed::Choices(picked)
        }
        FieldType::Product => {
            let Some(picks) = check_products(report, field, value) else {
                return None;
            };
            check_selection_count(report, field, picks.len());
            Parsed::Products(picks)
        }
        FieldType::Hidden => match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Parsed::Other,
            _ => {
                report.error("invalid_type", id, format!("{label} must be a scalar value"));
                return None;
            }
        },
        _ => {
            let Some(text) = value.as_str() else {
                report.error("invalid_type", id, format!("{label} must be text"));
                return None;
            };
            let text = text.trim();
            check_text(report, field, text);
            match field.field_type {
                FieldType::Email if !email_regex().is_match(text) => {
                    report.error("invalid_email", id, format!("{label} must be an email address"));
                    Parsed::Other
                }
                FieldType::Url if !is_http_url(text) => {
                    report.error("invalid_url", id, format!("{label} must be an http(s) URL"));
                    Parsed::Other
                }
                FieldType::Phone if !phone_regex().is_match(text) => {
                    report.error("invalid_phone", id, format!("{label} must be a phone number"));
                    Parsed::Other
                }
                FieldType::Date => {
                    if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_err() {
                        report.error("invalid_date", id, format!("{label} must be a date (YYYY-MM-DD)"));
                    }
                    Parsed::Other
                }
                FieldType::Time => match NaiveTime::parse_from_str(text, "%H:%M") {
                    Ok(time) => Parsed::Time(time),
                    Err(_) => {
                        report.error("invalid_time", id, format!("{label} must be a time (HH:MM)"));
                        Parsed::Other
                    }
                },
                _ => Parsed::Other,
            }
        }
    };

    (report.errors.len() == errors_before).then_some(parsed)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn check_number(report: &mut ValidationReport, field: &FormField, number: f64) {
    let id = Some(field.id);
    let label = display_name(field);
    let rules = &field.validation;
    let (min, max) = if field.field_type == FieldType::Rating {
        if number.fract() != 0.0 {
            report.error("invalid_type", id, format!("{label} must be a whole number"));
        }
        (rules.min.or(Some(1.0)), rules.max.or(Some(DEFAULT_RATING_MAX)))
    } else {
        (rules.min, rules.max)
    };
    if let Some(min) = min {
        if number < min {
            report.error("below_minimum", id, format!("{label} must be at least {min}"));
        }
    }
    if let Some(max) = max {
        if number > max {
            report.error("above_maximum", id, format!("{label} must be at most {max}"));
        }
    }
}

fn check_text(report: &mut ValidationReport, field: &FormField, text: &str) {
    let id = Some(field.id);
    let label = display_name(field);
    let ValidationRules {
        min_length,
        max_length,
        pattern,
        ..
    } = &field.validation;
    let length = text.chars().count();
    if let Some(min) = min_length {
        if length < *min {
            report.error("too_short", id, format!("{label} must be at least {min} characters"));
        }
    }
    if let Some(max) = max_length {
        if length > *max {
            report.error("too_long", id, format!("{label} must be at most {max} characters"));
        }
    }
    if let Some(pattern) = pattern {
        match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(re) if re.is_match(text) => {}
            Ok(_) => report.error("pattern_mismatch", id, format!("{label} has an invalid format")),
            Err(err) => {
                tracing::warn!(field = %field.name, error = %err, "stored pattern does not compile");
                report.error("pattern_mismatch", id, format!("{label} cannot be validated"));
            }
        }
    }
}

fn check_choices<'a>(
    report: &mut ValidationReport,
    field: &'a FormField,
    value: &Value,
) -> Option<BTreeSet<&'a str>> {
    let id = Some(field.id);
    let label = display_name(field);
    let values: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut picked = BTreeSet::new();
    for item in values {
        let Some(choice) = item.as_str() else {
            report.error("invalid_type", id, format!("{label} must be a list of options"));
            return None;
        };
        let Some(option) = field.option(choice) else {
            report.error("invalid_option", id, format!("{choice:?} is not an option of {label}"));
            return None;
        };
        if !picked.insert(option.value.as_str()) {
            report.error("duplicate_selection", id, format!("{choice:?} is selected twice in {label}"));
            return None;
        }
    }
    Some(picked)
}

fn check_products(
    report: &mut ValidationReport,
    field: &FormField,
    value: &Value,
) -> Option<Vec<ProductPick>> {
    let id = Some(field.id);
    let label = display_name(field);
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut picks: Vec<ProductPick> = Vec::new();
    for item in items {
        let (choice, quantity) = match item {
            Value::String(s) => (s.as_str(), 1),
            Value::Object(obj) => {
                let Some(choice) = obj.get("value").and_then(Value::as_str) else {
                    report.error("invalid_type", id, format!("{label} items need a \"value\""));
                    return None;
                };
                let quantity = match obj.get("quantity") {
                    None => 1,
                    Some(q) => match q.as_u64() {
                        Some(q) if (1..=MAX_QUANTITY).contains(&q) => q,
                        _ => {
                            report.error(
                                "invalid_quantity",
                                id,
                                format!("quantity of {choice:?} must be between 1 and {MAX_QUANTITY}"),
                            );
                            return None;
                        }
                    },
                };
                (choice, quantity)
            }
            _ => {
                report.error("invalid_type", id, format!("{label} must list products"));
                return None;
            }
        };
        if field.option(choice).is_none() {
            report.error("invalid_option", id, format!("{choice:?} is not a product of {label}"));
            return None;
        }
        if picks.iter().any(|p| p.value == choice) {
            report.error("duplicate_selection", id, format!("{choice:?} is listed twice in {label}"));
            return None;
        }
        picks.push(ProductPick {
            value: choice.to_string(),
            quantity: quantity as u32,
        });
    }
    Some(picks)
}

fn check_selection_count(report: &mut ValidationReport, field: &FormField, count: usize) {
    let id = Some(field.id);
    let label = display_name(field);
    if let Some(min) = field.validation.min_selections {
        if count < min {
            report.error("too_few_selections", id, format!("select at least {min} in {label}"));
        }
    }
    if let Some(max) = field.validation.max_selections {
        if count > max {
            report.error("too_many_selections", id, format!("select at most {max} in {label}"));
        }
    }
}

fn derive_outcome(
    report: &mut ValidationReport,
    schema: &FormSchema,
    parsed: &[(&FormField, Parsed<'_>)],
) -> SubmissionOutcome {
    let logic = &schema.settings.logic;
    let mut outcome = SubmissionOutcome::default();

    if let BusinessLogic::Quiz { pass_score_percent, .. } = logic {
        outcome.quiz = Some(score_quiz(schema, parsed, *pass_score_percent));
    }

    let has_products = parsed.iter().any(|(_, p)| matches!(p, Parsed::Products(_)));
    if has_products || matches!(logic, BusinessLogic::Ecommerce { .. }) {
        let (currency, tax_rate_bps) = match logic {
            BusinessLogic::Ecommerce { currency, tax_rate_bps } => (currency.as_str(), *tax_rate_bps),
            _ => (DEFAULT_CURRENCY, 0),
        };
        outcome.order = summarize_order(report, parsed, currency, tax_rate_bps);
    }

    if let BusinessLogic::Appointment {
        slot_minutes,
        open_hour,
        close_hour,
    } = logic
    {
        for (field, answer) in parsed {
            if let Parsed::Time(time) = answer {
                if !slot_available(*time, *slot_minutes, *open_hour, *close_hour) {
                    report.error(
                        "slot_unavailable",
                        Some(field.id),
                        format!(
                            "{} is not a bookable slot ({open_hour}:00-{close_hour}:00, every {slot_minutes} minutes)",
                            time.format("%H:%M")
                        ),
                    );
                }
            }
        }
    }
    outcome
}

fn score_quiz(schema: &FormSchema, parsed: &[(&FormField, Parsed<'_>)], pass_score_percent: u8) -> QuizScore {
    // Unanswered questions still count toward the maximum.
    let possible: u64 = schema
        .input_fields()
        .filter(|f| matches!(f.field_type, FieldType::Radio | FieldType::Select | FieldType::Checkbox))
        .filter_map(|f| f.points)
        .map(u64::from)
        .sum();
    let mut earned = 0u64;
    let mut correct_fields = Vec::new();

    for (field, answer) in parsed {
        let Some(points) = field.points else { continue };
        if let Parsed::Choices(picked) = answer {
            let correct: BTreeSet<&str> = field
                .options
                .iter()
                .filter(|o| o.is_correct)
                .map(|o| o.value.as_str())
                .collect();
            if !correct.is_empty() && *picked == correct {
                earned += u64::from(points);
                correct_fields.push(field.name.clone());
            }
        }
    }
    let percent = if possible == 0 { 0 } else { earned * 100 / possible };
    QuizScore {
        earned: saturate(earned),
        possible: saturate(possible),
        percent: saturate(percent),
        passed: possible > 0 && percent >= u64::from(pass_score_percent),
        correct_fields,
    }
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Price the picked products. Totals that do not fit in cents are reported
/// as an error instead of wrapping.
fn summarize_order(
    report: &mut ValidationReport,
    parsed: &[(&FormField, Parsed<'_>)],
    currency: &str,
    tax_rate_bps: u32,
) -> Option<OrderSummary> {
    let overflow = |report: &mut ValidationReport| -> Option<OrderSummary> {
        report.error("order_total_overflow", None, "order total is too large");
        None
    };

    let mut items = Vec::new();
    let mut subtotal_cents = 0i64;
    for (field, answer) in parsed {
        let Parsed::Products(picks) = answer else { continue };
        for pick in picks {
            let Some(option) = field.option(&pick.value) else { continue };
            let unit = option.price_cents.unwrap_or(0);
            let Some(total_cents) = unit.checked_mul(i64::from(pick.quantity)) else {
                return overflow(report);
            };
            let Some(running) = subtotal_cents.checked_add(total_cents) else {
                return overflow(report);
            };
            subtotal_cents = running;
            items.push(LineItem {
                field: field.name.clone(),
                value: option.value.clone(),
                label: option.label.clone(),
                quantity: pick.quantity,
                unit_price_cents: unit,
                total_cents,
            });
        }
    }
    let tax_cents = subtotal_cents
        .checked_mul(i64::from(tax_rate_bps))
        .and_then(|scaled| scaled.checked_add(5_000))
        .map(|scaled| scaled / 10_000);
    let Some(tax_cents) = tax_cents else {
        return overflow(report);
    };
    let Some(total_cents) = subtotal_cents.checked_add(tax_cents) else {
        return overflow(report);
    };
    Some(OrderSummary {
        currency: currency.to_string(),
        items,
        subtotal_cents,
        tax_cents,
        total_cents,
    })
}

/// Whether a booking at `time` fits the opening hours and slot grid.
pub fn slot_available(time: NaiveTime, slot_minutes: u32, open_hour: u8, close_hour: u8) -> bool {
    if slot_minutes == 0 {
        return false;
    }
    let minute = time.hour() * 60 + time.minute();
    let open = u32::from(open_hour) * 60;
    let close = u32::from(close_hour) * 60;
    minute >= open && minute + slot_minutes <= close && (minute - open) % slot_minutes == 0
}
