//! Forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::FormSchema;
use crate::error::{Error, Result};

text_enum! {
    /// Publication state of a form.
    pub enum FormStatus: "form status" {
        /// Being edited, not reachable publicly.
        Draft => "draft",
        /// Accepting submissions.
        Published => "published",
        /// Frozen; kept for its submissions.
        Archived => "archived",
    }
}

impl FormStatus {
    /// Whether the form may move to `next`.
    pub fn can_transition_to(&self, next: FormStatus) -> bool {
        use FormStatus::*;
        matches!(
            (self, next),
            (Draft, Published) | (Published, Draft) | (Draft, Archived) | (Published, Archived) | (Archived, Draft)
        )
    }
}

/// A form owned by a user inside a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub slug: String,
    pub status: FormStatus,
    pub schema: FormSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    /// Create a draft form.
    pub fn new(
        tenant_id: Uuid,
        owner_id: Uuid,
        title: impl Into<String>,
        slug: impl Into<String>,
        schema: FormSchema,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            owner_id,
            title: title.into(),
            description: None,
            slug: slug.into(),
            status: FormStatus::Draft,
            schema,
            theme_id: None,
            template_id: None,
            published_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status, stamping `published_at` on first publication.
    pub fn transition(&mut self, next: FormStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        if next == FormStatus::Published {
            self.published_at.get_or_insert(now);
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Whether the public endpoints may serve this form.
    pub fn is_live(&self) -> bool {
        self.status == FormStatus::Published && self.deleted_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> Form {
        Form::new(Uuid::new_v4(), Uuid::new_v4(), "Survey", "survey", FormSchema::default())
    }

    #[test]
    fn test_publish_stamps_time() {
        let mut form = draft();
        form.transition(FormStatus::Published).unwrap();
        let first = form.published_at.unwrap();
        assert!(form.is_live());

        form.transition(FormStatus::Archived).unwrap();
        form.transition(FormStatus::Draft).unwrap();
        form.transition(FormStatus::Published).unwrap();
        assert_eq!(form.published_at, Some(first));
    }

    #[test]
    fn test_archived_cannot_publish_directly() {
        let mut form = draft();
        form.transition(FormStatus::Archived).unwrap();
        let err = form.transition(FormStatus::Published).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        form.transition(FormStatus::Draft).unwrap();
        form.transition(FormStatus::Published).unwrap();
    }

    #[test]
    fn test_deleted_form_not_live() {
        let mut form = draft();
        form.transition(FormStatus::Published).unwrap();
        form.deleted_at = Some(Utc::now());
        assert!(!form.is_live());
    }
}
