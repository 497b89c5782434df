//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including event construction failures and identifier parsing errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Event name is empty or not a dotted identifier
    #[error("Invalid event name: {0}")]
    InvalidEventName(String),

    /// A property key was added twice to the same event
    #[error("Duplicate property key: {0}")]
    DuplicateProperty(String),

    /// A duration string could not be parsed back into a duration
    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
