//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Keeps error response shapes uniform across endpoints and translates
//! [`RelationError`] into HTTP status codes.
//!
//! # Key invariants and assumptions
//! - Error responses carry a stable `code` and a human-readable `message`.
//! - "Could not determine" (backend or store failure) is always a 500 and
//!   never collapses into 403.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorResponse;
use crate::relation::RelationError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use authz::api::error::ApiError;
/// use authz::api::types::ErrorResponse;
///
/// let err = ApiError {
///     status: StatusCode::NOT_FOUND,
///     body: ErrorResponse {
///         code: "not_found".to_string(),
///         message: "missing".to_string(),
///         request_id: None,
///     },
/// };
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Build a 500 from an internal failure, logging the detail server-side.
pub fn api_internal(message: &str, err: &dyn std::error::Error) -> ApiError {
    tracing::error!(error = %err, source = ?err.source(), "{message}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Client went away before the answer was ready.
pub fn api_cancelled() -> ApiError {
    // 499 is the de-facto "client closed request" status.
    let status = StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT);
    api_error(status, "cancelled", "request cancelled")
}

impl From<RelationError> for ApiError {
    fn from(err: RelationError) -> Self {
        match &err {
            RelationError::NotExist => api_not_found("relation doesn't exist"),
            RelationError::InvalidUuid(_)
            | RelationError::InvalidDetail(_)
            | RelationError::BulkLimit { .. }
            | RelationError::BulkShape(_) => api_validation_error(&err.to_string()),
            RelationError::Conflict => api_conflict("already_exists", "relation already exists"),
            RelationError::AlreadyOwned(_) => api_conflict("already_owned", &err.to_string()),
            RelationError::Unauthenticated(inner) => api_unauthorized(&inner.to_string()),
            RelationError::PermissionDenied(detail) => api_forbidden(detail),
            RelationError::Cancelled => api_cancelled(),
            RelationError::CheckTaskFailed(_) => api_internal("permission check failed", &err),
            RelationError::CreatingRelationInStore(_)
            | RelationError::CreatingRelationInAuthzEngine(_)
            | RelationError::DeletingRelationInAuthzEngine(_)
            | RelationError::DeletingRelationInStore(_)
            | RelationError::Store(_)
            | RelationError::Backend(_) => api_internal(&err.to_string(), &err),
        }
    }
}
