//! Error taxonomy surfaced by the resource gate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-visible failures.
///
/// Permission denial, ownership mismatch and hidden-field writes all collapse
/// into [`AccessError::Forbidden`] so a caller cannot tell which check failed.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Authentication required: missing or invalid credentials")]
    AuthenticationRequired,

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("Model '{resource}' not found. Known models: {}", .known.join(", "))]
    ResourceNotFound {
        resource: String,
        known: Vec<String>,
    },

    #[error("Record '{id}' not found in '{resource}'")]
    RecordNotFound { resource: String, id: String },

    #[error("Validation failed: {}", summarize(.violations))]
    ValidationFailed { violations: Vec<FieldViolation> },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    #[must_use]
    pub fn record_not_found(resource: &str, id: &str) -> Self {
        AccessError::RecordNotFound {
            resource: resource.to_owned(),
            id: id.to_owned(),
        }
    }
}

/// Single schema violation found in a write payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures reported by the storage collaborator.
///
/// These are never turned into a deny: a failed ownership lookup means the
/// decision cannot be trusted, so the error propagates.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}
