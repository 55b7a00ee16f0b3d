//! Entities persisted by the store and exchanged over the API.

/// Declares a fieldless enum that is stored as lowercase text.
///
/// Generates `as_str`, `Display`, `FromStr`, and snake_case serde.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Text form used in the database and in JSON.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(crate::error::Error::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod analytics;
pub mod export;
pub mod field;
pub mod form;
pub mod schema;
pub mod shortlink;
pub mod submission;
pub mod template;
pub mod tenant;
pub mod theme;
pub mod tool;
pub mod user;

pub use analytics::{DailyCount, FormAnalytics};
pub use export::{ExportJob, ExportStatus, EXPORT_STEPS};
pub use field::{FieldOption, FieldPosition, FieldType, FormField, ValidationRules};
pub use form::{Form, FormStatus};
pub use schema::{FormSchema, FormSettings};
pub use shortlink::ShortLink;
pub use submission::{LineItem, OrderSummary, QuizScore, Submission, SubmissionOutcome};
pub use template::{BusinessLogic, FormTemplate, TemplateCategory};
pub use tenant::{IsolationSettings, Plan, Tenant, TenantFeatures};
pub use theme::{ButtonStyle, FormTheme, StyleConfig, StyleOverrides};
pub use tool::{ToolRegistryEntry, ToolStatus};
pub use user::{normalize_email, Role, User, UserProfile};
