use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid client configuration: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rejected request; `code` is the Marketo error code when the rejection
    /// came inside a response envelope
    #[error("API rejected the request (HTTP {status}): {message}")]
    Validation {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Temporary API failure: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A multi-step create got the object made but a later step failed
    #[error("{kind} {id} was created but could not be completed: {source}")]
    Incomplete {
        kind: &'static str,
        id: String,
        source: Box<ApiError>,
    },
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Id of an object that exists remotely despite the error
    pub fn created_id(&self) -> Option<&str> {
        match self {
            ApiError::Incomplete { id, .. } => Some(id),
            _ => None,
        }
    }

    pub(crate) fn incomplete(kind: &'static str, id: impl Into<String>, source: ApiError) -> Self {
        ApiError::Incomplete {
            kind,
            id: id.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn transient(message: impl Into<String>) -> Self {
        ApiError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Classify a transport failure. Anything that never produced a response
    /// (connect, timeout, reset) is worth another attempt.
    pub(crate) fn from_transport(e: reqwest::Error, timeout_seconds: u64) -> Self {
        if e.is_timeout() {
            ApiError::transient(format!("Request timeout after {} seconds", timeout_seconds))
        } else if e.is_builder() {
            ApiError::Configuration(e.to_string())
        } else if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else {
            ApiError::transient(format!("HTTP request failed: {}", e))
        }
    }
}
