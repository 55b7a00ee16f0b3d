//! Form themes with desktop styles and mobile overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::ValidationReport;

text_enum! {
    /// Button rendering style.
    pub enum ButtonStyle: "button style" {
        Filled => "filled",
        Outline => "outline",
        Text => "text",
    }
}

/// Complete style for one breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub primary_color: String,
    pub background_color: String,
    pub text_color: String,
    pub font_family: String,
    pub font_size_px: u16,
    pub border_radius_px: u16,
    pub spacing_px: u16,
    pub button_style: ButtonStyle,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            primary_color: "#2563eb".to_string(),
            background_color: "#ffffff".to_string(),
            text_color: "#111827".to_string(),
            font_family: "Inter, sans-serif".to_string(),
            font_size_px: 16,
            border_radius_px: 6,
            spacing_px: 16,
            button_style: ButtonStyle::Filled,
        }
    }
}

/// Sparse mobile overrides; unset values inherit the desktop style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_px: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius_px: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing_px: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_style: Option<ButtonStyle>,
}

impl StyleOverrides {
    /// Apply these overrides on top of `base`.
    pub fn apply_to(&self, base: &StyleConfig) -> StyleConfig {
        StyleConfig {
            primary_color: self.primary_color.clone().unwrap_or_else(|| base.primary_color.clone()),
            background_color: self
                .background_color
                .clone()
                .unwrap_or_else(|| base.background_color.clone()),
            text_color: self.text_color.clone().unwrap_or_else(|| base.text_color.clone()),
            font_family: self.font_family.clone().unwrap_or_else(|| base.font_family.clone()),
            font_size_px: self.font_size_px.unwrap_or(base.font_size_px),
            border_radius_px: self.border_radius_px.unwrap_or(base.border_radius_px),
            spacing_px: self.spacing_px.unwrap_or(base.spacing_px),
            button_style: self.button_style.unwrap_or(base.button_style),
        }
    }
}

/// A named theme belonging to a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTheme {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub desktop: StyleConfig,
    #[serde(default)]
    pub mobile: StyleOverrides,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormTheme {
    /// Create a non-default theme.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, desktop: StyleConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            desktop,
            mobile: StyleOverrides::default(),
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The mobile style after applying overrides.
    pub fn effective_mobile(&self) -> StyleConfig {
        self.mobile.apply_to(&self.desktop)
    }

    /// Check the desktop style and the merged mobile style.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        if self.name.trim().is_empty() {
            report.error("theme_name_empty", None, "theme name must not be empty");
        }
        check_style(&mut report, "desktop", &self.desktop);
        check_style(&mut report, "mobile", &self.effective_mobile());
        report
    }
}

fn check_style(report: &mut ValidationReport, breakpoint: &str, style: &StyleConfig) {
    for (name, value) in [
        ("primary_color", &style.primary_color),
        ("background_color", &style.background_color),
        ("text_color", &style.text_color),
    ] {
        if !is_hex_color(value) {
            report.error(
                "invalid_color",
                None,
                format!("{breakpoint}.{name} must be #rgb or #rrggbb, got {value:?}"),
            );
        }
    }
    if !(8..=48).contains(&style.font_size_px) {
        report.error(
            "invalid_font_size",
            None,
            format!("{breakpoint}.font_size_px must be between 8 and 48"),
        );
    }
    if style.border_radius_px > 64 {
        report.error(
            "invalid_radius",
            None,
            format!("{breakpoint}.border_radius_px must be at most 64"),
        );
    }
    if style.spacing_px > 64 {
        report.error(
            "invalid_spacing",
            None,
            format!("{breakpoint}.spacing_px must be at most 64"),
        );
    }
    if style.font_family.trim().is_empty() {
        report.error(
            "invalid_font_family",
            None,
            format!("{breakpoint}.font_family must not be empty"),
        );
    }
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
