//! Core error types.

use thiserror::Error;

/// Domain errors raised by the core crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A layout operation could not be applied.
    #[error("invalid layout operation: {0}")]
    Layout(String),

    /// Referenced field does not exist in the schema.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// Illegal state machine transition.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// A stored or submitted value names no known variant.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// Type being parsed.
        kind: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidTransition {
            from: "completed".into(),
            to: "running".into(),
        };
        assert_eq!(err.to_string(), "invalid status transition: completed -> running");

        let err = Error::UnknownVariant {
            kind: "role",
            value: "root".into(),
        };
        assert!(err.to_string().contains("root"));
    }
}
