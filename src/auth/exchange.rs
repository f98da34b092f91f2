//! Refresh exchange against the backend's refresh endpoint

use super::coordinator::RefreshExchange;
use super::store::CredentialStore;
use super::types::{RefreshTokenLocation, TokenGrant};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{OutgoingRequest, Transport};
use crate::types::Method;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// `POST <base>/auth/refresh` exchange.
///
/// Sent straight to the transport, bypassing the dispatcher, so a rejection
/// can never trigger another refresh.
pub struct HttpRefreshExchange {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    url: String,
    location: RefreshTokenLocation,
    csrf_header: String,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
}

impl HttpRefreshExchange {
    /// Create an exchange for the refresh endpoint described by `config`
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            store,
            url: config.url_for(&config.refresh_path),
            location: config.refresh_token_location.clone(),
            csrf_header: config.csrf_header.clone(),
            timeout: config.timeout,
            default_headers: config
                .default_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn build_request(&self, refresh_token: &str) -> OutgoingRequest {
        let mut request = OutgoingRequest::new(Method::POST, &self.url);
        for (key, value) in &self.default_headers {
            request.set_header(key.as_str(), value.as_str());
        }
        request.set_header("Accept", "application/json");

        if let Some(csrf) = self.store.csrf_token() {
            request.set_header(self.csrf_header.as_str(), csrf);
        }

        match &self.location {
            RefreshTokenLocation::Body => {
                request.body = Some(serde_json::json!({ "refreshToken": refresh_token }));
            }
            RefreshTokenLocation::Cookie { name } => {
                request.set_header("Cookie", format!("{name}={refresh_token}"));
            }
        }

        request
    }
}

#[async_trait]
impl RefreshExchange for HttpRefreshExchange {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenGrant> {
        let request = self.build_request(refresh_token);
        debug!(url = %self.url, "Exchanging refresh token");

        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| Error::timeout(self.timeout))??;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::auth_expired("refresh token rejected"));
        }
        if !status.is_success() {
            return Err(Error::from_status(
                status.as_u16(),
                response.text(),
                response.retry_after(),
            ));
        }

        let mut grant = response.json::<TokenGrant>()?;
        grant.csrf_token = response.header(&self.csrf_header).map(str::to_string);
        Ok(grant)
    }
}

impl std::fmt::Debug for HttpRefreshExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRefreshExchange")
            .field("url", &self.url)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
