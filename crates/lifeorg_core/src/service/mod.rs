//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own the cross-record rules (visibility, ownership, derived figures)
//!   that no single repository can check.
//! - Keep the HTTP layer decoupled from storage details.
//!
//! # Invariants
//! - Records the caller may not see surface as `NotFound`, never `Forbidden`.
//! - `Forbidden` is reserved for visible records the caller may not change.

use crate::model::ValidationError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod dashboard_service;
pub mod expense_service;
pub mod goal_service;
pub mod task_service;
pub mod user_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by every use-case service.
#[derive(Debug)]
pub enum ServiceError {
    /// A field failed validation.
    Validation(ValidationError),
    /// The request is well-formed but not acceptable in the current state.
    Invalid(String),
    /// The target record does not exist or is not visible to the caller.
    NotFound(&'static str),
    /// A uniqueness rule rejected the write.
    Conflict(String),
    /// The caller is authenticated but may not perform the operation.
    Forbidden(String),
    /// Missing, unknown or expired credentials.
    Unauthorized(String),
    /// Repository-level failure.
    Repo(RepoError),
    /// Password hashing failure.
    Crypto(String),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Invalid(message) => write!(f, "{message}"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Forbidden(message) => write!(f, "forbidden: {message}"),
            Self::Unauthorized(message) => write!(f, "unauthorized: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Crypto(message) => write!(f, "password hashing failed: {message}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, .. } => Self::NotFound(entity),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

/// Unwraps a lookup result, mapping `None` to `NotFound(entity)`.
pub(crate) fn found<T>(value: Option<T>, entity: &'static str) -> ServiceResult<T> {
    value.ok_or(ServiceError::NotFound(entity))
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::model::ValidationError;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn repo_errors_keep_their_meaning() {
        let err: ServiceError = RepoError::not_found("task", Uuid::nil()).into();
        assert!(matches!(err, ServiceError::NotFound("task")));

        let err: ServiceError = RepoError::Conflict("dup".to_string()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err: ServiceError =
            RepoError::Validation(ValidationError::new("title", "blank")).into();
        match err {
            ServiceError::Validation(inner) => assert_eq!(inner.field, "title"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
