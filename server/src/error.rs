//! Request failures and their HTTP rendering.
//!
//! Body shape: `{"error": {"kind": "...", "message": "...", "field": "..."}}`
//! with `field` omitted when the failure is not tied to one input.

use hostel_core::HostelError;
use hostel_core::error::ErrorCategory;
use serde_json::json;

use crate::router::Reply;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Hostel(#[from] HostelError),

    #[error("invalid request body: {0}")]
    Body(String),

    #[error("no route for {method} {path}")]
    NoRoute { method: String, path: String },
}

impl ApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Hostel(err) => err.category(),
            ApiError::Body(_) => ErrorCategory::ValidationError,
            ApiError::NoRoute { .. } => ErrorCategory::NotFoundError,
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            ApiError::Hostel(err) => err.field(),
            _ => None,
        }
    }
}

/// HTTP status for an error category.
pub fn status_for(category: ErrorCategory) -> u16 {
    match category {
        ErrorCategory::ValidationError => 400,
        ErrorCategory::UnidentifiedError => 401,
        ErrorCategory::ForbiddenError => 403,
        ErrorCategory::NotFoundError => 404,
        ErrorCategory::PreconditionError => 409,
        ErrorCategory::StorageError | ErrorCategory::ConfigError | ErrorCategory::InternalError => {
            500
        }
    }
}

impl From<ApiError> for Reply {
    fn from(err: ApiError) -> Self {
        let category = err.category();
        let status = status_for(category);
        let message = if category.caller_fault() {
            err.to_string()
        } else {
            tracing::error!(kind = category.as_str(), error = %err, "request failed");
            "internal server error".to_string()
        };

        let mut body = json!({
            "kind": category.as_str(),
            "message": message,
        });
        if let Some(field) = err.field() {
            body["field"] = json!(field);
        }
        Reply::new(status, json!({ "error": body }))
    }
}
