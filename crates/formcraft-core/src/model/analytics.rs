//! Per-form submission analytics, served as JSON.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::FormSchema;
use super::submission::Submission;

/// Submissions received on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// Aggregates over a form's submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormAnalytics {
    pub total_submissions: u64,
    /// One entry per day of the window, oldest first, zero days included.
    pub daily: Vec<DailyCount>,
    /// Field name -> option value -> times chosen.
    pub choices: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_quiz_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_pass_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_cents: Option<i64>,
}

impl FormAnalytics {
    /// Aggregate `submissions` for the last `days` days ending today.
    ///
    /// `total` is the all-time count; `submissions` may be a recent subset.
    pub fn compute(schema: &FormSchema, submissions: &[Submission], total: u64, days: u32) -> Self {
        let today = Utc::now().date_naive();
        let days = days.max(1);
        let start = today - Duration::days(i64::from(days) - 1);

        let mut per_day: BTreeMap<NaiveDate, u64> = (0..days)
            .map(|offset| (start + Duration::days(i64::from(offset)), 0))
            .collect();

        let mut choices: BTreeMap<String, BTreeMap<String, u64>> = schema
            .input_fields()
            .filter(|f| f.field_type.is_choice())
            .map(|f| {
                let counts = f.options.iter().map(|o| (o.value.clone(), 0)).collect();
                (f.name.clone(), counts)
            })
            .collect();

        let mut quiz_percents = Vec::new();
        let mut quiz_passed = 0u64;
        let mut revenue: Option<i64> = None;

        for submission in submissions {
            if let Some(count) = per_day.get_mut(&submission.submitted_at.date_naive()) {
                *count += 1;
            }
            for (name, counts) in choices.iter_mut() {
                let Some(answer) = submission.answers.get(name) else { continue };
                for value in chosen_values(answer) {
                    if let Some(count) = counts.get_mut(value) {
                        *count += 1;
                    }
                }
            }
            if let Some(quiz) = &submission.outcome.quiz {
                quiz_percents.push(f64::from(quiz.percent));
                if quiz.passed {
                    quiz_passed += 1;
                }
            }
            if let Some(order) = &submission.outcome.order {
                *revenue.get_or_insert(0) += order.total_cents;
            }
        }

        let (average_quiz_percent, quiz_pass_rate) = if quiz_percents.is_empty() {
            (None, None)
        } else {
            let n = quiz_percents.len() as f64;
            (
                Some(quiz_percents.iter().sum::<f64>() / n),
                Some(quiz_passed as f64 / n),
            )
        };

        Self {
            total_submissions: total,
            daily: per_day
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
            choices,
            average_quiz_percent,
            quiz_pass_rate,
            revenue_cents: revenue,
        }
    }
}

/// Option values picked in a stored answer.
fn chosen_values(answer: &Value) -> Vec<&str> {
    match answer {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("value").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        Value::Object(obj) => obj.get("value").and_then(Value::as_str).into_iter().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, FormField, SubmissionOutcome};
    use serde_json::json;
    use uuid::Uuid;

    fn submission(answers: Value, days_ago: i64) -> Submission {
        let Value::Object(answers) = answers else { panic!("object expected") };
        let mut s = Submission::new(Uuid::new_v4(), Uuid::new_v4(), answers, SubmissionOutcome::default());
        s.submitted_at = Utc::now() - Duration::days(days_ago);
        s
    }

    #[test]
    fn test_counts_and_distribution() {
        let schema = FormSchema::from_fields(vec![
            FormField::new(FieldType::Radio, "color", "Color").with_choices(&["Red", "Blue"]),
            FormField::new(FieldType::Checkbox, "extras", "Extras").with_choices(&["A", "B"]),
            FormField::new(FieldType::Text, "note", "Note"),
        ]);
        let submissions = vec![
            submission(json!({"color": "red", "extras": ["a", "b"]}), 0),
            submission(json!({"color": "red"}), 0),
            submission(json!({"color": "blue", "extras": ["b"]}), 2),
            submission(json!({"color": "blue"}), 30),
        ];
        let analytics = FormAnalytics::compute(&schema, &submissions, 10, 7);

        assert_eq!(analytics.total_submissions, 10);
        assert_eq!(analytics.daily.len(), 7);
        assert_eq!(analytics.daily.last().unwrap().count, 2);
        assert_eq!(analytics.daily.iter().map(|d| d.count).sum::<u64>(), 3);
        assert_eq!(analytics.choices["color"]["red"], 2);
        assert_eq!(analytics.choices["color"]["blue"], 2);
        assert_eq!(analytics.choices["extras"]["b"], 2);
        assert!(!analytics.choices.contains_key("note"));
        assert_eq!(analytics.average_quiz_percent, None);
    }
}
