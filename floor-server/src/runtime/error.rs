use super::store::StoreError;
use shared::error::{AppError, ErrorCode};
use shared::key::KeyError;
use thiserror::Error;

/// Entity errors
///
/// Cloneable so one activation failure can be reported to every caller
/// queued behind it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EntityError {
    /// Command targeted an entity that was never created
    #[error("Entity not initialized: {0}")]
    NotInitialized(String),

    /// A referenced item inside an entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Version conflict on {stream}: expected {expected}, found {actual}")]
    VersionConflict {
        stream: String,
        expected: u64,
        actual: u64,
    },

    /// Mailbox closed or runtime shutting down
    #[error("Entity unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EntityResult<T> = Result<T, EntityError>;

impl EntityError {
    pub fn not_initialized(key: impl std::fmt::Display) -> Self {
        Self::NotInitialized(key.to_string())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Structured error code for the HTTP layer
    pub fn code(&self) -> ErrorCode {
        match self {
            EntityError::NotInitialized(_) => ErrorCode::EntityNotInitialized,
            EntityError::NotFound(_) => ErrorCode::NotFound,
            EntityError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            EntityError::InvalidStateTransition(_) => ErrorCode::InvalidStateTransition,
            EntityError::Validation(_) => ErrorCode::ValidationFailed,
            EntityError::VersionConflict { .. } => ErrorCode::VersionConflict,
            EntityError::Unavailable(_) => ErrorCode::EntityUnavailable,
            EntityError::Store(_) => ErrorCode::StorageError,
            EntityError::Serialization(_) => ErrorCode::SerializationError,
            EntityError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<StoreError> for EntityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                stream,
                expected,
                actual,
            } => EntityError::VersionConflict {
                stream,
                expected,
                actual,
            },
            StoreError::Serialization(e) => EntityError::Serialization(e.to_string()),
            other => {
                tracing::error!(error = %other, "Storage error occurred");
                EntityError::Store(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for EntityError {
    fn from(err: serde_json::Error) -> Self {
        EntityError::Serialization(err.to_string())
    }
}

impl From<KeyError> for EntityError {
    fn from(err: KeyError) -> Self {
        EntityError::Validation(err.to_string())
    }
}

impl From<EntityError> for AppError {
    fn from(err: EntityError) -> Self {
        let code = err.code();
        let app = AppError::with_message(code, err.to_string());
        match err {
            EntityError::VersionConflict {
                expected, actual, ..
            } => app
                .with_detail("expected", expected)
                .with_detail("actual", actual),
            _ => app,
        }
    }
}
