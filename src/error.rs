use crate::models::EntityId;
use crate::validation::FieldErrors;
use thiserror::Error;

/// HTTP statuses meaning the server definitively did not apply the request.
pub const HARD_FAILURE_STATUSES: &[u16] = &[400, 401, 403, 404, 409, 410, 422];

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-side form validation errors, one message per field
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    /// Non-success HTTP status returned by the backend
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Network-level failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Server payload missing identity or required fields
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local storage errors (credential file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unauthorized access errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Another mutation on the same entity is still in flight
    #[error("Operation already pending for {0}")]
    Busy(EntityId),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// How a failure affects optimistic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Caught before any network call.
    Validation,
    /// The operation definitively did not apply; roll back.
    Hard,
    /// Indeterminate; the server may still be processing. Keep optimistic state.
    Soft,
}

impl AppError {
    /// Classify the error for rollback decisions
    pub fn classify(&self) -> FailureClass {
        match self {
            AppError::Validation(_) => FailureClass::Validation,
            AppError::Http { status, .. } if HARD_FAILURE_STATUSES.contains(status) => {
                FailureClass::Hard
            }
            AppError::NotFound(_) | AppError::Unauthorized(_) | AppError::MalformedPayload(_) => {
                FailureClass::Hard
            }
            _ => FailureClass::Soft,
        }
    }

    /// Check if the failure should trigger a rollback
    pub fn is_hard_failure(&self) -> bool {
        self.classify() == FailureClass::Hard
    }

    /// Check if error is a network-level failure (no response)
    pub fn is_connection_error(&self) -> bool {
        matches!(self, AppError::Transport(_) | AppError::Timeout)
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_) | AppError::Http { status: 404, .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::Http { status, .. } => Some(*status),
            AppError::NotFound(_) => Some(404),
            AppError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    /// Short message suitable for an error banner
    pub fn user_message(&self) -> String {
        match self {
            AppError::Transport(_) | AppError::Timeout => {
                "Could not reach the server. Changes are saved locally.".to_string()
            }
            AppError::Http { status, message } if *status >= 500 => {
                format!("The server had a problem ({}): {}", status, message)
            }
            AppError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout
        } else if let Some(status) = err.status() {
            AppError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            AppError::MalformedPayload(err.to_string())
        } else {
            AppError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> AppError {
        AppError::Http {
            status,
            message: "x".into(),
        }
    }

    #[test]
    fn test_hard_statuses() {
        for status in [400, 401, 403, 404, 409, 410, 422] {
            assert_eq!(http(status).classify(), FailureClass::Hard, "status {}", status);
        }
    }

    #[test]
    fn test_soft_failures() {
        assert_eq!(http(500).classify(), FailureClass::Soft);
        assert_eq!(http(503).classify(), FailureClass::Soft);
        assert_eq!(http(408).classify(), FailureClass::Soft);
        assert_eq!(AppError::Timeout.classify(), FailureClass::Soft);
        assert_eq!(
            AppError::Transport("connection refused".into()).classify(),
            FailureClass::Soft
        );
    }

    #[test]
    fn test_validation_class() {
        let mut errors = FieldErrors::default();
        errors.add("name", "Name is required");
        assert_eq!(
            AppError::Validation(errors).classify(),
            FailureClass::Validation
        );
    }

    #[test]
    fn test_status_code() {
        assert_eq!(http(409).status_code(), Some(409));
        assert_eq!(AppError::NotFound("g".into()).status_code(), Some(404));
        assert_eq!(AppError::Timeout.status_code(), None);
        assert!(AppError::Timeout.is_connection_error());
    }
}
