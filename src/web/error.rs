//! HTTP-facing error type. Maps the domain error taxonomy onto status codes
//! and response bodies; the domain layer itself never touches `axum` types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::domain::error::{DomainError, FieldError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(Vec<FieldError>),
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error")]
    Storage,
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(field_error) => ApiError::Validation(vec![field_error]),
            DomainError::Authorization(msg) => ApiError::Authorization(msg),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Storage(source) => {
                tracing::error!(error = %source, "storage error");
                ApiError::Storage
            }
        }
    }
}

/// Wraps a raw `sqlx`/`anyhow` failure encountered directly in a handler
/// (outside the domain layer's own error conversions), logging it at error
/// level before surfacing a 500.
pub fn db_error(context: &str, err: impl std::fmt::Display) -> ApiError {
    tracing::error!(context, error = %err, "database operation failed");
    ApiError::Storage
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(errors) => {
                let mut fields: std::collections::BTreeMap<String, Vec<String>> = std::collections::BTreeMap::new();
                for error in errors {
                    fields.entry(error.field.clone()).or_default().push(error.message.clone());
                }
                (StatusCode::BAD_REQUEST, json!(fields))
            }
            ApiError::Authorization(msg) => (StatusCode::FORBIDDEN, json!({"detail": msg})),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({"detail": msg})),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({"detail": msg})),
            ApiError::Storage => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"detail": "internal error"}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// `Option::ok_or_else(NotFound)` shorthand.
pub trait OptionNotFoundExt<T> {
    fn or_not_found(self, what: impl Into<String>) -> Result<T, ApiError>;
}

impl<T> OptionNotFoundExt<T> for Option<T> {
    fn or_not_found(self, what: impl Into<String>) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::NotFound(what.into()))
    }
}
