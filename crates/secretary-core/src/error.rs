//! Error types shared by every secretary crate.
//!
//! Errors fall into three kinds so callers can tell "your input was wrong"
//! apart from "the remote side broke":
//!
//! - [`SecretaryError::Validation`]: malformed or missing input, raised before
//!   any remote call is made.
//! - [`SecretaryError::NotFound`] and [`SecretaryError::Ambiguous`]: a lookup
//!   did not resolve to exactly one calendar, task, event or journal.
//! - [`SecretaryError::Operation`]: anything else, wrapped as
//!   `Failed to {action}: {cause}`.

use std::fmt;

use thiserror::Error;

/// Result alias for secretary operations.
pub type SecretaryResult<T> = Result<T, SecretaryError>;

/// Error raised by parsing, validation and provider operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretaryError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// A calendar or entity lookup missed.
    #[error("{0}")]
    NotFound(String),

    /// A lookup matched more than one entity.
    #[error("{0}")]
    Ambiguous(String),

    /// Any other failure, wrapped with the action that was attempted.
    #[error("Failed to {action}: {cause}")]
    Operation { action: String, cause: String },
}

impl SecretaryError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates an ambiguity error.
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::Ambiguous(message.into())
    }

    /// Creates an operational error for `action` caused by `cause`.
    pub fn operation(action: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Operation {
            action: action.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns true for errors caused by the caller's input
    /// (validation, not-found and ambiguity).
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::Operation { .. })
    }

    /// Wraps `self` as an operational failure of `action` unless it is
    /// already an input error, which passes through unchanged.
    #[must_use]
    pub fn context(self, action: &str) -> Self {
        match self {
            Self::Operation {
                action: inner,
                cause,
            } if inner != action => Self::Operation {
                action: action.to_string(),
                cause: format!("Failed to {inner}: {cause}"),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_display() {
        let err = SecretaryError::operation("create task", "connection refused");
        assert_eq!(err.to_string(), "Failed to create task: connection refused");
        assert!(!err.is_input_error());
    }

    #[test]
    fn input_errors_display_verbatim() {
        let err = SecretaryError::validation("Task summary cannot be empty");
        assert_eq!(err.to_string(), "Task summary cannot be empty");
        assert!(err.is_input_error());

        let err = SecretaryError::not_found("Task 'x' not found in calendar 'Work'");
        assert!(err.is_input_error());
        assert!(SecretaryError::ambiguous("two").is_input_error());
    }

    #[test]
    fn context_keeps_input_errors() {
        let err = SecretaryError::not_found("Calendar 'Work' not found. Available calendars: []");
        assert_eq!(err.clone().context("move task"), err);
    }

    #[test]
    fn context_rewraps_nested_operations() {
        let err = SecretaryError::operation("save task", "HTTP 500");
        assert_eq!(
            err.context("move task").to_string(),
            "Failed to move task: Failed to save task: HTTP 500"
        );

        let err = SecretaryError::operation("move task", "HTTP 500");
        assert_eq!(err.context("move task").to_string(), "Failed to move task: HTTP 500");
    }
}
