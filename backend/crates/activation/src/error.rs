//! Activation Error Types
//!
//! Activation-specific error variants that integrate with the unified
//! `kernel::error::AppError` system. Business rejections are ordinary
//! variants of the same `Result`, branched on by kind.

use crate::domain::codec::CodecError;
use crate::domain::value_objects::CodeStatus;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Activation-specific result type alias
pub type ActivationResult<T> = Result<T, ActivationError>;

#[derive(Debug, Error)]
pub enum ActivationError {
    /// Missing or unusable request field
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid code format: {0}")]
    InvalidFormat(#[from] CodecError),

    #[error("Code not found")]
    CodeNotFound,

    #[error("Code already used")]
    AlreadyUsed,

    #[error("Code has been revoked")]
    CodeRevoked,

    #[error("Device banned")]
    DeviceBanned,

    /// Revocation of a code that is not available
    #[error("Code cannot be revoked: status is {0}")]
    NotRevocable(CodeStatus),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Batch {0} already exists")]
    BatchExists(u32),

    /// Missing or wrong admin key
    #[error("Unauthorized")]
    Unauthorized,

    /// Persistence was unreachable at startup
    #[error("Service unavailable")]
    Unavailable,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActivationError {
    /// Stable machine-readable code clients branch on
    pub fn error_code(&self) -> &'static str {
        match self {
            ActivationError::InvalidRequest(_) => "InvalidRequest",
            ActivationError::InvalidFormat(_) => "InvalidFormat",
            ActivationError::CodeNotFound => "CodeNotFound",
            ActivationError::AlreadyUsed => "AlreadyUsed",
            ActivationError::CodeRevoked => "CodeRevoked",
            ActivationError::DeviceBanned => "DeviceBanned",
            ActivationError::NotRevocable(_) => "NotRevocable",
            ActivationError::InvalidBatch(_) => "InvalidBatch",
            ActivationError::BatchExists(_) => "BatchExists",
            ActivationError::Unauthorized => "Unauthorized",
            ActivationError::Unavailable
            | ActivationError::Database(_)
            | ActivationError::Internal(_) => "InternalError",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActivationError::InvalidRequest(_)
            | ActivationError::InvalidFormat(_)
            | ActivationError::InvalidBatch(_) => ErrorKind::BadRequest,
            ActivationError::CodeNotFound => ErrorKind::NotFound,
            ActivationError::AlreadyUsed
            | ActivationError::NotRevocable(_)
            | ActivationError::BatchExists(_) => ErrorKind::Conflict,
            ActivationError::CodeRevoked => ErrorKind::Gone,
            ActivationError::DeviceBanned => ErrorKind::Forbidden,
            ActivationError::Unauthorized => ErrorKind::Unauthorized,
            ActivationError::Unavailable => ErrorKind::ServiceUnavailable,
            ActivationError::Database(_) | ActivationError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Message safe to show to the caller
    fn public_message(&self) -> String {
        match self {
            ActivationError::Database(_) | ActivationError::Internal(_) => {
                "Internal server error".to_string()
            }
            ActivationError::Unavailable => "Activation service unavailable".to_string(),
            other => other.to_string(),
        }
    }

    fn action(&self) -> Option<&'static str> {
        match self {
            ActivationError::InvalidFormat(_) => Some("Check the code and enter it again"),
            ActivationError::DeviceBanned => Some("Contact support to review this device"),
            ActivationError::Unavailable
            | ActivationError::Database(_)
            | ActivationError::Internal(_) => Some("Retry later"),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            ActivationError::Database(e) => {
                tracing::error!(error = %e, "Activation database error");
            }
            ActivationError::Internal(msg) => {
                tracing::error!(message = %msg, "Activation internal error");
            }
            ActivationError::Unavailable => {
                tracing::error!("Activation persistence unavailable");
            }
            ActivationError::AlreadyUsed | ActivationError::DeviceBanned => {
                tracing::warn!(error = %self, "Activation rejected");
            }
            ActivationError::Unauthorized => {
                tracing::warn!("Admin request without valid key");
            }
            _ => {
                tracing::debug!(error = %self, "Activation error");
            }
        }
    }
}

impl From<ActivationError> for AppError {
    fn from(err: ActivationError) -> Self {
        let app_err = AppError::new(err.kind(), err.public_message()).with_code(err.error_code());
        let app_err = match err.action() {
            Some(action) => app_err.with_action(action),
            None => app_err,
        };
        app_err.with_source(err)
    }
}

impl IntoResponse for ActivationError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ActivationError::InvalidFormat(CodecError::MalformedFormat).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ActivationError::CodeNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ActivationError::AlreadyUsed.status_code(), StatusCode::CONFLICT);
        assert_eq!(ActivationError::CodeRevoked.status_code(), StatusCode::GONE);
        assert_eq!(ActivationError::DeviceBanned.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ActivationError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ActivationError::Unavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ActivationError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_do_not_leak() {
        let app: AppError = ActivationError::Internal("connection reset by 10.0.0.3".into()).into();
        assert_eq!(app.code(), Some("InternalError"));
        assert_eq!(app.message(), "Internal server error");
    }

    #[test]
    fn test_business_rejection_keeps_code() {
        let app: AppError = ActivationError::DeviceBanned.into();
        assert_eq!(app.code(), Some("DeviceBanned"));
        assert_eq!(app.kind(), ErrorKind::Forbidden);
        assert!(app.action().is_some());
    }
}
