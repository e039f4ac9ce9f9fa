//! Error taxonomy. Kinds, not HTTP status codes -- the mapping to status
//! codes lives at the transport boundary in `crate::web::error`.

use thiserror::Error;

/// A single `{field: message}` validation failure. An empty `field` maps to
/// the conventional `non_field_errors` bucket, kept by the wire layer too.
#[derive(Debug, Clone, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        Self::new("", message)
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    /// An input violates a field- or non-field validation rule.
    #[error(transparent)]
    Validation(#[from] FieldError),

    /// Missing/invalid api-key or `author_id` does not match the required
    /// role on the target interval.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Referenced entity does not exist under the caller's app.
    #[error("not found: {0}")]
    NotFound(String),

    /// `(app, external_id)` uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying persistence failure.
    #[error("storage error")]
    Storage(#[from] sqlx::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;
