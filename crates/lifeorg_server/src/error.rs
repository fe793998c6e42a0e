//! HTTP error mapping.
//!
//! # Responsibility
//! - Translate core `ServiceError`s and extractor rejections into status
//!   codes and a stable JSON body.
//!
//! # Invariants
//! - Every error body is `{"error": ..., "field": ..., "details": ...}`.
//! - Internal failures are logged and answered with a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lifeorg_core::ServiceError;
use log::error;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::BadRequest(_) | Self::Malformed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Validation(err) => Self::Validation {
                field: err.field,
                message: err.message,
            },
            ServiceError::Invalid(message) | ServiceError::Conflict(message) => {
                Self::BadRequest(message)
            }
            ServiceError::NotFound(entity) => Self::NotFound(entity),
            ServiceError::Forbidden(message) => Self::Forbidden(message),
            ServiceError::Unauthorized(message) => Self::Unauthorized(message),
            other @ (ServiceError::Repo(_) | ServiceError::Crypto(_)) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::Malformed(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        Self::Malformed(value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        Self::Malformed(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation { field, message } => ErrorBody {
                error: "validation failed".to_string(),
                field: Some(field),
                details: Some(message),
            },
            Self::Malformed(details) => ErrorBody {
                error: "malformed request".to_string(),
                field: None,
                details: Some(details),
            },
            Self::Internal(details) => {
                error!("event=request_failed module=http status=error error={details}");
                ErrorBody {
                    error: "internal server error".to_string(),
                    field: None,
                    details: None,
                }
            }
            other => ErrorBody {
                error: other.to_string(),
                field: None,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::StatusCode;
    use lifeorg_core::ServiceError;

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::validation("title", "blank"), StatusCode::BAD_REQUEST),
            (ServiceError::invalid("timer running"), StatusCode::BAD_REQUEST),
            (ServiceError::Conflict("duplicate".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("task"), StatusCode::NOT_FOUND),
            (ServiceError::forbidden("owner only"), StatusCode::FORBIDDEN),
            (ServiceError::unauthorized("expired"), StatusCode::UNAUTHORIZED),
            (ServiceError::Crypto("bad salt".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn validation_keeps_field_name() {
        match ApiError::from(ServiceError::validation("amount", "must be positive")) {
            ApiError::Validation { field, message } => {
                assert_eq!(field, "amount");
                assert_eq!(message, "must be positive");
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
