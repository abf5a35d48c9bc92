use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequestData = 1,
    InvalidEntity = 2,
    ValidationError = 3,
    DuplicatedKeyError = 98,
    InternalError = 99,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequestData => "INVALID_REQUEST_DATA",
            ErrorCode::InvalidEntity => "INVALID_ENTITY",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::DuplicatedKeyError => "DUPLICATED_KEY_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn number(&self) -> u16 {
        *self as u16
    }
}

/// Every failure a save request can end with.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Payload or id failed schema validation, or a hook rejected the data
    #[error("{message}")]
    InvalidRequestData {
        message: String,
        path: Option<String>,
    },

    #[error("{message}")]
    InvalidEntity { message: String },

    /// Schema validation failure when the endpoint reports it separately
    #[error("{message}")]
    Validation { message: String, path: String },

    #[error("{message}")]
    DuplicatedKey {
        message: String,
        fields: Vec<String>,
        previous: anyhow::Error,
    },

    #[error("{message}")]
    Internal {
        message: String,
        previous: Option<anyhow::Error>,
    },
}

impl SaveError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        SaveError::InvalidRequestData {
            message: message.into(),
            path: None,
        }
    }

    pub fn invalid_entity(message: impl Into<String>) -> Self {
        SaveError::InvalidEntity {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SaveError::Internal {
            message: message.into(),
            previous: None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SaveError::InvalidRequestData { .. } => ErrorCode::InvalidRequestData,
            SaveError::InvalidEntity { .. } => ErrorCode::InvalidEntity,
            SaveError::Validation { .. } => ErrorCode::ValidationError,
            SaveError::DuplicatedKey { .. } => ErrorCode::DuplicatedKeyError,
            SaveError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// HTTP-equivalent status for the response.
    pub fn status_code(&self) -> u16 {
        match self {
            SaveError::Internal { .. } => 500,
            _ => 400,
        }
    }

    /// Field path of a validation failure, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            SaveError::InvalidRequestData { path, .. } => path.as_deref(),
            SaveError::Validation { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The storage or hook failure this error was built from.
    pub fn previous_error(&self) -> Option<&anyhow::Error> {
        match self {
            SaveError::DuplicatedKey { previous, .. } => Some(previous),
            SaveError::Internal { previous, .. } => previous.as_ref(),
            _ => None,
        }
    }
}

/// Serialized form of a [`SaveError`] written back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub kind: ErrorCode,
    pub message: String,
    pub status: u16,
}

impl From<&SaveError> for ErrorResponse {
    fn from(err: &SaveError) -> Self {
        Self {
            code: err.code().number(),
            kind: err.code(),
            message: err.to_string(),
            status: err.status_code(),
        }
    }
}
