/**
 * Backend Error Types
 *
 * Every failure inside the realtime core is folded into one taxonomy:
 *
 * - `NotFound` - referenced conversation, contact, user or message is absent
 * - `Conflict` - a uniqueness constraint was violated
 * - `Unauthorized` - the connection may not perform the event
 * - `Validation` - a frame or value does not match its schema
 * - `Internal` - a store is unavailable or returned something unexpected
 *
 * Lower-level errors (`sqlx`, `redis`, `serde_json`, `SharedError`) are
 * converted with `From` so handlers can use `?` throughout.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::shared::event::ErrorPayload;
use crate::shared::SharedError;

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use pulsechat::backend::error::BackendError;
///
/// let err = BackendError::not_found("conversation 42 does not exist");
/// assert_eq!(err.kind(), "not_found");
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Referenced entity is absent
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message
        message: String,
    },

    /// Uniqueness violation, e.g. a duplicate conversation pair or message id
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message
        message: String,
    },

    /// The connection is not allowed to perform this action
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message
        message: String,
    },

    /// Malformed frame or value
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message
        message: String,
    },

    /// Store unavailable or unexpected failure
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message
        message: String,
    },
}

impl BackendError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Taxonomy name carried in `error` events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Validation { .. } => "validation",
            Self::Internal { .. } => "internal",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Unauthorized { message }
            | Self::Validation { message }
            | Self::Internal { message } => message.clone(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Body of the realtime `error` event
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.message(),
        }
    }
}

impl From<SharedError> for BackendError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::ValidationError { .. } => Self::validation(err.to_string()),
            SharedError::SerializationError { .. } => Self::internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(BackendError::not_found("x").kind(), "not_found");
        assert_eq!(BackendError::conflict("x").kind(), "conflict");
        assert_eq!(BackendError::unauthorized("x").kind(), "unauthorized");
        assert_eq!(BackendError::validation("x").kind(), "validation");
        assert_eq!(BackendError::internal("x").kind(), "internal");
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(BackendError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BackendError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            BackendError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_shared_error() {
        let backend_error: BackendError = SharedError::validation("frame", "bad").into();
        assert_eq!(backend_error.kind(), "validation");
        assert!(backend_error.message().contains("frame"));
    }

    #[test]
    fn test_payload() {
        let payload = BackendError::not_found("conversation missing").to_payload();
        assert_eq!(payload.kind, "not_found");
        assert_eq!(payload.message, "conversation missing");
    }
}
