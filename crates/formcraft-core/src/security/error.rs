//! Access-control error types.

use thiserror::Error;

/// Errors raised by role and plan checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// The caller's role does not allow the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The change would leave the tenant without an active owner.
    #[error("tenant must keep at least one active owner")]
    LastOwner,

    /// The tenant's plan does not include the feature.
    #[error("feature not available on current plan: {0}")]
    FeatureDisabled(&'static str),

    /// A plan quota is exhausted.
    #[error("plan limit reached: {what} (limit {limit})")]
    PlanLimit {
        /// Quota name.
        what: &'static str,
        /// Configured limit.
        limit: u32,
    },
}

/// Result type for access-control checks.
pub type SecurityResult<T> = Result<T, SecurityError>;
