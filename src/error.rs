//! Error types for the condo API client
//!
//! This module defines the error hierarchy for the whole request layer.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every logical call settles with exactly one of these. A `401` is never
//! surfaced directly: callers see either the replayed response or
//! [`Error::AuthExpired`].

use std::time::Duration;
use thiserror::Error;

/// The main error type for the request layer
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Transport Errors
    // ============================================================================
    /// No response was received (connection refused, reset, DNS, broken body)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Response received with a retry-eligible status (5xx, 408, 429)
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    /// The bounded wait on the network call expired
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ============================================================================
    // Terminal Errors
    // ============================================================================
    /// Credentials could not be renewed; the session is over
    #[error("Authentication expired: {message}")]
    AuthExpired { message: String },

    /// Cancellation was observed at a suspension point
    #[error("Request aborted: {reason}")]
    Aborted { reason: String },

    /// Client error (4xx other than 408/429), never retried
    #[error("Request rejected with HTTP {status}: {body}")]
    Validation { status: u16, body: String },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ============================================================================
    // I/O and Generic Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an auth-expired error
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::AuthExpired {
            message: message.into(),
        }
    }

    /// Create an abort error
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Classify a non-success, non-401 HTTP status into the matching variant
    pub fn from_status(status: u16, body: impl Into<String>, retry_after: Option<Duration>) -> Self {
        if is_retryable_status(status) {
            Self::HttpStatus {
                status,
                body: body.into(),
                retry_after,
            }
        } else {
            Self::Validation {
                status,
                body: body.into(),
            }
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error is the result of cancellation
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }

    /// HTTP status carried by the error, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } | Error::Validation { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided delay before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::HttpStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::network(err.to_string())
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Result type alias for the request layer
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::from_status(503, "Unavailable", None);
        assert_eq!(err.to_string(), "HTTP 503: Unavailable");

        let err = Error::from_status(404, "Not found", None);
        assert_eq!(err.to_string(), "Request rejected with HTTP 404: Not found");

        let err = Error::aborted("view closed");
        assert_eq!(err.to_string(), "Request aborted: view closed");
    }

    #[test_case(408, true ; "request timeout")]
    #[test_case(429, true ; "too many requests")]
    #[test_case(500, true ; "internal error")]
    #[test_case(503, true ; "unavailable")]
    #[test_case(599, true ; "upper 5xx")]
    #[test_case(400, false ; "bad request")]
    #[test_case(403, false ; "forbidden")]
    #[test_case(404, false ; "not found")]
    #[test_case(422, false ; "unprocessable")]
    fn test_status_classification(status: u16, retryable: bool) {
        let err = Error::from_status(status, "", None);
        assert_eq!(err.is_retryable(), retryable);
        assert_eq!(err.status(), Some(status));
        if retryable {
            assert!(matches!(err, Error::HttpStatus { .. }));
        } else {
            assert!(matches!(err, Error::Validation { .. }));
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::network("connection reset").is_retryable());
        assert!(Error::timeout(Duration::from_secs(1)).is_retryable());

        assert!(!Error::auth_expired("refresh rejected").is_retryable());
        assert!(!Error::aborted("teardown").is_retryable());
        assert!(!Error::config("test").is_retryable());
    }

    #[test]
    fn test_is_abort() {
        assert!(Error::aborted("x").is_abort());
        assert!(!Error::timeout(Duration::from_millis(5)).is_abort());
    }

    #[test]
    fn test_retry_after_only_on_http_status() {
        let err = Error::from_status(429, "", Some(Duration::from_secs(2)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(Error::network("down").retry_after(), None);
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
