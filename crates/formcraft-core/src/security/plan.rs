//! Plan feature gate.

use super::error::{SecurityError, SecurityResult};
use crate::model::{Tenant, TenantFeatures};

/// Feature and quota checks over a tenant's effective features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGate {
    features: TenantFeatures,
}

impl FeatureGate {
    /// Gate for a tenant: plan defaults merged with its overrides.
    pub fn for_tenant(tenant: &Tenant) -> Self {
        Self {
            features: tenant.effective_features(),
        }
    }

    /// Gate over already merged features.
    pub fn new(features: TenantFeatures) -> Self {
        Self { features }
    }

    /// The features this gate decides on.
    pub fn features(&self) -> &TenantFeatures {
        &self.features
    }

    fn require(enabled: Option<bool>, feature: &'static str) -> SecurityResult<()> {
        if enabled.unwrap_or(false) {
            Ok(())
        } else {
            Err(SecurityError::FeatureDisabled(feature))
        }
    }

    pub fn require_custom_themes(&self) -> SecurityResult<()> {
        Self::require(self.features.custom_themes, "custom_themes")
    }

    pub fn require_tool_exports(&self) -> SecurityResult<()> {
        Self::require(self.features.tool_exports, "tool_exports")
    }

    pub fn require_short_links(&self) -> SecurityResult<()> {
        Self::require(self.features.short_links, "short_links")
    }

    /// Check that one more form fits; `existing` counts non-deleted forms.
    pub fn check_form_quota(&self, existing: u64) -> SecurityResult<()> {
        Self::check_quota(self.features.max_forms, existing, "forms")
    }

    /// Check that one more submission fits on a form holding `existing`.
    pub fn check_submission_quota(&self, existing: u64) -> SecurityResult<()> {
        Self::check_quota(
            self.features.max_submissions_per_form,
            existing,
            "submissions per form",
        )
    }

    fn check_quota(limit: Option<u32>, existing: u64, what: &'static str) -> SecurityResult<()> {
        match limit {
            Some(limit) if existing >= u64::from(limit) => Err(SecurityError::PlanLimit { what, limit }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Plan;

    #[test]
    fn test_free_plan_gate() {
        let tenant = Tenant::new("Acme", "acme", Plan::Free);
        let gate = FeatureGate::for_tenant(&tenant);
        assert_eq!(
            gate.require_custom_themes(),
            Err(SecurityError::FeatureDisabled("custom_themes"))
        );
        assert!(gate.require_tool_exports().is_err());
        assert!(gate.require_short_links().is_ok());
        assert!(gate.check_form_quota(4).is_ok());
        assert_eq!(
            gate.check_form_quota(5),
            Err(SecurityError::PlanLimit {
                what: "forms",
                limit: 5
            })
        );
        assert!(gate.check_submission_quota(100).is_err());
    }

    #[test]
    fn test_override_enables_feature() {
        let mut tenant = Tenant::new("Acme", "acme", Plan::Free);
        tenant.features.tool_exports = Some(true);
        assert!(FeatureGate::for_tenant(&tenant).require_tool_exports().is_ok());
    }

    #[test]
    fn test_enterprise_unlimited() {
        let gate = FeatureGate::new(Plan::Enterprise.default_features());
        assert!(gate.check_form_quota(1_000_000).is_ok());
        assert!(gate.check_submission_quota(u64::MAX).is_ok());
    }
}
