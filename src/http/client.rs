//! Request dispatcher
//!
//! [`ApiClient`] is the entry point for every API call. For each attempt it:
//! - attaches the bearer token and, on mutating methods, the CSRF token
//! - sends through the [`Transport`] under a bounded wait
//! - rotates the CSRF token from any response that carries one
//! - routes `401`s to the refresh coordinator and replays once renewed
//! - retries transient failures according to the [`RetryPolicy`]
//!
//! Every suspension point observes the descriptor's abort signal.

use super::rate_limit::RateLimiter;
use super::request::RequestDescriptor;
use super::response::ApiResponse;
use super::retry::RetryPolicy;
use super::transport::{OutgoingRequest, ReqwestTransport, Transport};
use crate::auth::{
    CredentialRecord, CredentialStore, HttpRefreshExchange, MemoryCredentialStore,
    RefreshCoordinator, RefreshExchange, RefreshPhase, SignOutHandler, SignOutReason,
};
use crate::cancel::{CancellationController, CancellationGroup};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// API client with credential refresh, retry and cancellation
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    retry: RetryPolicy,
    rate_limiter: Option<RateLimiter>,
    cancellation: Arc<CancellationController>,
}

impl ApiClient {
    /// Create a client with the default transport and an in-memory store
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Install credentials obtained at sign-in
    pub fn login(&self, credentials: CredentialRecord) {
        self.store.replace(credentials);
        self.coordinator.reset();
        debug!("Credentials installed");
    }

    /// Drop credentials and abort every outstanding request
    pub fn logout(&self) {
        self.store.clear();
        let aborted = self.cancellation.abort_all("logout");
        debug!(aborted_groups = aborted, "Logged out");
    }

    /// Snapshot of the current credentials
    pub fn credentials(&self) -> CredentialRecord {
        self.store.load()
    }

    /// Current refresh phase
    pub fn refresh_phase(&self) -> RefreshPhase {
        self.coordinator.phase()
    }

    /// Number of refresh exchanges performed by this client
    pub fn refresh_count(&self) -> u64 {
        self.coordinator.exchange_count()
    }

    // ------------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------------

    /// Create a cancellation group for one logical scope
    pub fn create_cancellation_group(&self, name: impl Into<String>) -> CancellationGroup {
        self.cancellation.create_group(name)
    }

    /// Abort a cancellation group. Idempotent.
    pub fn abort(&self, group: &CancellationGroup, reason: impl AsRef<str>) -> bool {
        self.cancellation.abort(group, reason)
    }

    /// Cancellation controller of this client
    pub fn cancellation(&self) -> &CancellationController {
        &self.cancellation
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(RequestDescriptor::get(path)).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(RequestDescriptor::post(path).json(body)).await
    }

    /// Make a PUT request
    pub async fn put(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(RequestDescriptor::put(path).json(body)).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(RequestDescriptor::patch(path).json(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(RequestDescriptor::delete(path)).await
    }

    /// Make a request and parse JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T> {
        self.request(descriptor).await?.json()
    }

    /// Make a GET request and parse JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json(RequestDescriptor::get(path)).await
    }

    /// Alias of [`ApiClient::request`]
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
        self.request(descriptor).await
    }

    /// Dispatch one logical request.
    ///
    /// Settles exactly once, however many refreshes and retries happen
    /// underneath. A `401` never surfaces: the caller sees the replayed
    /// response or [`Error::AuthExpired`].
    #[instrument(skip(self, descriptor), fields(method = %descriptor.method, path = %descriptor.path))]
    pub async fn request(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
        let is_refresh_call = self.config.is_refresh_path(&descriptor.path);
        let mut descriptor = descriptor;
        let mut retries = 0;
        let mut replayed_after_refresh = false;

        loop {
            descriptor.signal.check()?;

            let sent_token = self.store.access_token();
            let outcome = self.attempt(&descriptor, sent_token.as_deref()).await;

            let error = match outcome {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status().as_u16(), attempt = descriptor.attempt, "Request succeeded");
                    return Ok(response);
                }
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    if descriptor.skip_auth_refresh {
                        return Err(Error::Validation {
                            status: 401,
                            body: response.text(),
                        });
                    }
                    if is_refresh_call {
                        self.coordinator
                            .force_sign_out(SignOutReason::RefreshRejected);
                        return Err(Error::auth_expired(
                            SignOutReason::RefreshRejected.to_string(),
                        ));
                    }
                    if replayed_after_refresh {
                        self.coordinator
                            .force_sign_out(SignOutReason::ReplayRejected);
                        return Err(Error::auth_expired(
                            SignOutReason::ReplayRejected.to_string(),
                        ));
                    }

                    debug!(attempt = descriptor.attempt, "Received 401, renewing credentials");
                    self.coordinator
                        .renew(sent_token.as_deref(), &descriptor.signal)
                        .await?;
                    replayed_after_refresh = true;
                    descriptor = descriptor.next_attempt();
                    continue;
                }
                Ok(response) => Error::from_status(
                    response.status().as_u16(),
                    response.text(),
                    response.retry_after(),
                ),
                Err(err) => err,
            };
            // Only the replay immediately after a refresh is terminal on 401.
            replayed_after_refresh = false;

            match self.retry.next_delay(&error, retries) {
                Some(delay) => {
                    warn!(
                        "Request failed ({}), attempt {}/{}, retrying in {:?}",
                        error,
                        retries + 1,
                        self.retry.max_retries + 1,
                        delay
                    );
                    self.retry.wait(delay, &descriptor.signal).await?;
                    retries += 1;
                    descriptor = descriptor.next_attempt();
                }
                None => {
                    if error.is_retryable() {
                        warn!(error = %error, retries, "Retries exhausted");
                    }
                    return Err(error);
                }
            }
        }
    }

    /// One network attempt: throttle, transmit under the timeout, rotate CSRF
    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> Result<ApiResponse> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.acquire(&descriptor.signal).await?;
        }

        let request = self.build_request(descriptor, access_token);
        let timeout = descriptor.timeout.unwrap_or(self.config.timeout);

        let response = descriptor
            .signal
            .guard(async {
                match tokio::time::timeout(timeout, self.transport.send(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::timeout(timeout)),
                }
            })
            .await?;

        if let Some(csrf) = response.header(&self.config.csrf_header) {
            self.store.set_csrf_token(csrf.to_string());
        }

        Ok(response)
    }

    fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        access_token: Option<&str>,
    ) -> OutgoingRequest {
        let mut request =
            OutgoingRequest::new(descriptor.method, self.config.url_for(&descriptor.path));

        // Add default headers
        for (key, value) in &self.config.default_headers {
            request.set_header(key.as_str(), value.as_str());
        }

        request.set_header("Accept", "application/json");

        // Add request-specific headers
        for (key, value) in &descriptor.headers {
            request.set_header(key.as_str(), value.as_str());
        }

        if let Some(token) = access_token {
            request.set_header("Authorization", format!("Bearer {token}"));
        }

        if descriptor.method.is_mutating() {
            if let Some(csrf) = self.store.csrf_token() {
                request.set_header(self.config.csrf_header.as_str(), csrf);
            }
        }

        request.query = descriptor
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        request.body = descriptor.body.clone();

        request
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("coordinator", &self.coordinator)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for API client
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn CredentialStore>>,
    exchange: Option<Arc<dyn RefreshExchange>>,
    on_sign_out: Option<SignOutHandler>,
}

impl ApiClientBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            store: None,
            exchange: None,
            on_sign_out: None,
        }
    }

    /// Use a custom transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom credential store
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom refresh exchange instead of the HTTP refresh endpoint
    pub fn refresh_exchange(mut self, exchange: Arc<dyn RefreshExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Navigation callback invoked once when the session cannot be recovered
    pub fn on_sign_out(mut self, handler: impl Fn(SignOutReason) + Send + Sync + 'static) -> Self {
        self.on_sign_out = Some(Arc::new(handler));
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the transport
    /// cannot be created
    pub fn build(self) -> Result<ApiClient> {
        self.config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config.user_agent)?),
        };
        let store: Arc<dyn CredentialStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let exchange: Arc<dyn RefreshExchange> = self.exchange.unwrap_or_else(|| {
            Arc::new(HttpRefreshExchange::new(
                transport.clone(),
                store.clone(),
                &self.config,
            ))
        });

        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            exchange,
            self.on_sign_out,
        ));
        let rate_limiter = self.config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(ApiClient {
            retry: self.config.retry_policy(),
            config: Arc::new(self.config),
            transport,
            store,
            coordinator,
            rate_limiter,
            cancellation: Arc::new(CancellationController::new()),
        })
    }
}

impl std::fmt::Debug for ApiClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("config", &self.config)
            .field("has_transport", &self.transport.is_some())
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
