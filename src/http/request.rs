//! Request descriptors

use crate::cancel::AbortSignal;
use crate::types::{JsonValue, Method, StringMap};
use std::time::Duration;
use tokio::time::Instant;

/// Everything needed to (re)issue one logical request.
///
/// A replay never mutates the original: [`RequestDescriptor::next_attempt`]
/// produces a successor with the same body, headers and signal and an
/// incremented retry counter.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Path relative to the configured base URL (or an absolute URL)
    pub path: String,
    /// Request headers
    pub headers: StringMap,
    /// Query parameters
    pub query: StringMap,
    /// Request body (JSON)
    pub body: Option<JsonValue>,
    /// Monotonic retry counter, 0 for the original transmission
    pub attempt: u32,
    /// When the logical request was created
    pub created_at: Instant,
    /// Cancellation signal observed at every suspension point
    pub signal: AbortSignal,
    /// Override the client timeout for this request
    pub timeout: Option<Duration>,
    /// Surface a `401` as a validation failure instead of refreshing
    pub skip_auth_refresh: bool,
}

impl RequestDescriptor {
    /// Create a descriptor for `method` and `path`
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: StringMap::new(),
            query: StringMap::new(),
            body: None,
            attempt: 0,
            created_at: Instant::now(),
            signal: AbortSignal::never(),
            timeout: None,
            skip_auth_refresh: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attach a cancellation signal
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Do not enter the refresh flow on `401` (sign-in calls)
    #[must_use]
    pub fn skip_auth_refresh(mut self) -> Self {
        self.skip_auth_refresh = true;
        self
    }

    /// Successor descriptor for a replay
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        next.attempt = self.attempt.saturating_add(1);
        next
    }
}
