//! Error types for the Amazon Advertising client.
//!
//! Every failure surfaced by the client is an [`AdvertisingError`]. Transport
//! level failures are kept separate in [`TransportError`](crate::transport::TransportError)
//! because the request pipeline treats them as retryable rather than fatal.

use std::time::Duration;
use thiserror::Error;

use crate::types::JobStatus;

/// Result type alias for Amazon Advertising operations.
pub type AdvertisingResult<T> = Result<T, AdvertisingError>;

/// Error type for Amazon Advertising client operations.
#[derive(Debug, Error)]
pub enum AdvertisingError {
    /// Configuration error (missing credentials, invalid URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// Authentication error (no refresh token, token exchange rejected).
    #[error("Authentication failed: {message}")]
    Auth {
        /// Error message from the token endpoint or the client.
        message: String,
    },

    /// Retryable failures persisted until the attempt limit was reached.
    #[error("Maximum retry count reached after {attempts} attempts (last failure: {last_failure})")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the final retryable failure.
        last_failure: String,
    },

    /// Non-retryable HTTP status.
    #[error("HTTP {status}: {}", .details.as_deref().unwrap_or("request failed"))]
    Http {
        /// HTTP status code.
        status: u16,
        /// The `details` message reported by the API, if any.
        details: Option<String>,
        /// Raw response body.
        body: String,
    },

    /// A report or snapshot job reached a failed terminal status.
    #[error(
        "Job {job_id} ended with status {status}{}",
        .details.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
    )]
    JobFailed {
        /// Report or snapshot id.
        job_id: String,
        /// Terminal status reported by the API.
        status: JobStatus,
        /// Status details, if any.
        details: Option<String>,
    },

    /// Polling exceeded the configured poll timeout.
    #[error("Job {job_id} did not complete within {elapsed:?}")]
    JobTimeout {
        /// Report or snapshot id.
        job_id: String,
        /// Time spent polling.
        elapsed: Duration,
    },

    /// Request validation error (unknown operation, missing path parameter).
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation issue.
        message: String,
    },

    /// A successful response could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Error message.
        message: String,
    },
}

impl AdvertisingError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        AdvertisingError::Configuration {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        AdvertisingError::Auth {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        AdvertisingError::Validation {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        AdvertisingError::Decode {
            message: message.into(),
        }
    }

    /// Builds an HTTP error from a non-retryable response.
    ///
    /// The API reports failures as `{"code": ..., "details": ...}`; older
    /// endpoints use `message` instead of `details`.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).into_owned();
        let details = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["details", "message", "code"]
                    .iter()
                    .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
            })
            .or_else(|| {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            });

        AdvertisingError::Http {
            status,
            details,
            body: text,
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AdvertisingError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth(&self) -> bool {
        matches!(self, AdvertisingError::Auth { .. })
    }
}

impl From<serde_json::Error> for AdvertisingError {
    fn from(err: serde_json::Error) -> Self {
        AdvertisingError::Decode {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for AdvertisingError {
    fn from(err: url::ParseError) -> Self {
        AdvertisingError::Configuration {
            message: format!("Invalid URL: {err}"),
        }
    }
}
