//! In-memory transport for tests
//!
//! [`MockTransport`] answers requests from scripted [`MockReply`] values
//! without touching the network, which makes it usable under a paused tokio
//! clock. Every request is recorded at the moment it is handed to the
//! transport.

use crate::error::{Error, Result};
use crate::http::{ApiResponse, OutgoingRequest, Transport};
use crate::types::{JsonValue, Method};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scripted outcome of one request
#[derive(Debug, Clone)]
pub struct MockReply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    delay: Option<Duration>,
    network_error: Option<String>,
    hang: bool,
}

impl MockReply {
    /// Reply with `status` and an empty body
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: None,
            network_error: None,
            hang: false,
        }
    }

    /// Reply `200` with a JSON body
    pub fn ok_json(body: JsonValue) -> Self {
        Self::json(200, body)
    }

    /// Reply with `status` and a JSON body
    pub fn json(status: u16, body: JsonValue) -> Self {
        Self::status(status)
            .header("Content-Type", "application/json")
            .body(body.to_string())
    }

    /// Fail without a response
    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            network_error: Some(message.into()),
            ..Self::status(0)
        }
    }

    /// Never respond
    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::status(0)
        }
    }

    /// Add a response header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a raw body
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Respond only after `delay`
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn to_response(&self) -> ApiResponse {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        ApiResponse::new(status, headers, self.body.clone())
    }
}

type Handler = Box<dyn Fn(&OutgoingRequest) -> MockReply + Send + Sync>;
type RouteKey = (Method, String);

#[derive(Default)]
struct Routes {
    queued: HashMap<RouteKey, VecDeque<MockReply>>,
    fallback: HashMap<RouteKey, MockReply>,
}

/// Scripted [`Transport`].
///
/// Lookup order per request: a custom handler if installed, then the
/// one-shot replies queued for `(method, path)`, then the route's sticky
/// reply, then `404`.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Routes>,
    handler: Option<Handler>,
    log: Mutex<Vec<OutgoingRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request with `handler`
    pub fn with_handler(
        handler: impl Fn(&OutgoingRequest) -> MockReply + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        }
    }

    /// Queue a one-shot reply for `method path`
    pub fn enqueue(&self, method: Method, path: &str, reply: MockReply) -> &Self {
        lock(&self.routes)
            .queued
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Reply used for `method path` once its queue is drained
    pub fn route(&self, method: Method, path: &str, reply: MockReply) -> &Self {
        lock(&self.routes)
            .fallback
            .insert((method, path.to_string()), reply);
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<OutgoingRequest> {
        lock(&self.log).clone()
    }

    /// Requests received for `method path`
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<OutgoingRequest> {
        lock(&self.log)
            .iter()
            .filter(|r| r.method == method && request_path(r) == path)
            .cloned()
            .collect()
    }

    /// Number of requests received for `method path`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    fn reply_for(&self, request: &OutgoingRequest) -> MockReply {
        if let Some(handler) = &self.handler {
            return handler(request);
        }

        let key = (request.method, request_path(request));
        let mut routes = lock(&self.routes);
        if let Some(reply) = routes.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return reply;
        }
        routes
            .fallback
            .get(&key)
            .cloned()
            .unwrap_or_else(|| MockReply::json(404, serde_json::json!({"error": "not found"})))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse> {
        let reply = self.reply_for(&request);
        lock(&self.log).push(request);

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        if reply.hang {
            std::future::pending::<()>().await;
        }
        if let Some(message) = reply.network_error {
            return Err(Error::network(message));
        }

        Ok(reply.to_response())
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("requests", &lock(&self.log).len())
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Path component of the request URL
pub fn request_path(request: &OutgoingRequest) -> String {
    url::Url::parse(&request.url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| request.url.clone())
}
