//! Hostel error types
//!
//! Every service returns [`HostelError`]. The front end only needs
//! [`HostelError::category`] to pick a response status; the message is
//! meant for the caller.

use thiserror::Error;

use crate::db::DbError;
use crate::roles::{Capability, Role};

pub type Result<T> = std::result::Result<T, HostelError>;

/// Error category for structured logging and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unknown enum value, missing field, out-of-range number
    ValidationError,
    /// The caller could not be identified
    UnidentifiedError,
    /// The caller's role lacks the capability
    ForbiddenError,
    /// Referenced row does not exist
    NotFoundError,
    /// Entity exists but is in the wrong state (room full, nothing to deallocate)
    PreconditionError,
    /// SQLite or pool failure
    StorageError,
    /// `hostel.toml` or env misconfigured
    ConfigError,
    /// Unexpected logic bugs
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging and response bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::UnidentifiedError => "UNIDENTIFIED",
            Self::ForbiddenError => "FORBIDDEN",
            Self::NotFoundError => "NOT_FOUND",
            Self::PreconditionError => "PRECONDITION_FAILED",
            Self::StorageError => "STORAGE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can fix the request and retry
    pub fn caller_fault(&self) -> bool {
        !matches!(
            self,
            Self::StorageError | Self::ConfigError | Self::InternalError
        )
    }
}

#[derive(Debug, Error)]
pub enum HostelError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Precondition(String),

    #[error("role {role} is not allowed to {capability}")]
    Forbidden { role: Role, capability: Capability },

    #[error("unidentified caller: {0}")]
    Unidentified(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl HostelError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::ValidationError,
            Self::NotFound { .. } => ErrorCategory::NotFoundError,
            Self::Precondition(_) => ErrorCategory::PreconditionError,
            Self::Forbidden { .. } => ErrorCategory::ForbiddenError,
            Self::Unidentified(_) => ErrorCategory::UnidentifiedError,
            Self::Db(_) => ErrorCategory::StorageError,
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Internal(_) => ErrorCategory::InternalError,
        }
    }

    /// Field the failure is attributed to, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<rusqlite::Error> for HostelError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_variants() {
        assert_eq!(
            HostelError::validation("morning", "unknown shift").category(),
            ErrorCategory::ValidationError
        );
        assert_eq!(
            HostelError::not_found("room", 7).category(),
            ErrorCategory::NotFoundError
        );
        assert_eq!(
            HostelError::precondition("Room is full").category(),
            ErrorCategory::PreconditionError
        );
        assert_eq!(
            HostelError::from(rusqlite::Error::QueryReturnedNoRows).category(),
            ErrorCategory::StorageError
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = HostelError::not_found("student", 42);
        assert_eq!(err.to_string(), "student 42 not found");

        let err = HostelError::Forbidden {
            role: Role::Student,
            capability: Capability::AllocateRooms,
        };
        assert_eq!(
            err.to_string(),
            "role student is not allowed to allocate_rooms"
        );
        assert!(err.category().caller_fault());
    }

    #[test]
    fn only_validation_has_a_field() {
        assert_eq!(
            HostelError::validation("night", "bad").field(),
            Some("night")
        );
        assert_eq!(HostelError::precondition("x").field(), None);
    }
}
