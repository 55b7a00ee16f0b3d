//! Error handling for the API.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use formcraft_core::{Issue, SecurityError, ValidationReport};
use formcraft_store::StoreError;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or unacceptable request.
    #[error("{0}")]
    BadRequest(String),

    /// Input failed validation; carries the individual findings.
    #[error("{message}")]
    Validation { message: String, issues: Vec<Issue> },

    /// Illegal status transition.
    #[error("{0}")]
    InvalidTransition(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// The plan does not allow the operation.
    #[error("{0}")]
    PlanRestricted(String),

    /// Resource does not exist or is not visible.
    #[error("{0}")]
    NotFound(String),

    /// Unique constraint violation.
    #[error("{0}")]
    Conflict(String),

    /// Too many requests from one client.
    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Unexpected failure; detail is logged, not returned.
    #[error("{0}")]
    Internal(String),
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Error carrying every finding of a failed validation.
    pub fn validation(report: ValidationReport) -> Self {
        AppError::Validation {
            message: report.summary(),
            issues: report.errors,
        }
    }

    /// Status and machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::InvalidTransition(_) => (StatusCode::BAD_REQUEST, "INVALID_TRANSITION"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::PlanRestricted(_) => (StatusCode::FORBIDDEN, "PLAN_RESTRICTED"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut error = json!({ "code": code, "message": message });
        if let AppError::Validation { issues, .. } = &self {
            error["details"] = json!(issues);
        }
        let body = Json(json!({ "success": false, "error": error }));

        let mut response = (status, body).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::InvalidReference(what) => AppError::BadRequest(format!("invalid reference: {what}")),
            StoreError::InvalidData(msg) => AppError::BadRequest(msg),
            StoreError::Finished(what) => AppError::InvalidTransition(format!("{what} already finished")),
            StoreError::LastOwner => AppError::from(SecurityError::LastOwner),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<formcraft_core::Error> for AppError {
    fn from(err: formcraft_core::Error) -> Self {
        use formcraft_core::Error;
        match err {
            Error::Validation(msg) => AppError::Validation {
                message: msg,
                issues: Vec::new(),
            },
            Error::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            Error::FieldNotFound(_) => AppError::NotFound(err.to_string()),
            Error::Layout(_) | Error::UnknownVariant { .. } => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<SecurityError> for AppError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::PermissionDenied(_) | SecurityError::LastOwner => AppError::Forbidden(err.to_string()),
            SecurityError::FeatureDisabled(_) | SecurityError::PlanLimit { .. } => {
                AppError::PlanRestricted(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_status() {
        let err = AppError::from(StoreError::Conflict("a form with this slug already exists".into()));
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
        let err = AppError::from(StoreError::NotFound("form"));
        assert_eq!(err.to_string(), "form not found");
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_security_errors_map_to_status() {
        let err = AppError::from(SecurityError::FeatureDisabled("custom_themes"));
        assert_eq!(err.status_and_code(), (StatusCode::FORBIDDEN, "PLAN_RESTRICTED"));
        let err = AppError::from(SecurityError::LastOwner);
        assert_eq!(err.status_and_code().1, "FORBIDDEN");
        let err = AppError::from(StoreError::LastOwner);
        assert_eq!(err.status_and_code(), (StatusCode::FORBIDDEN, "FORBIDDEN"));
    }

    #[test]
    fn test_internal_detail_hidden() {
        let response = AppError::Internal("connection reset by peer".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { retry_after_secs: 12 }.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
    }
}
