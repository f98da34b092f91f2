//! Credential and session types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Session credentials shared by every request of one client
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Short-lived bearer token
    pub access_token: Option<String>,
    /// Opaque token used only to obtain a new access token
    pub refresh_token: Option<String>,
    /// Anti-forgery token, rotated by the server on responses
    pub csrf_token: Option<String>,
}

impl CredentialRecord {
    /// Create a record from an access/refresh pair
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
            csrf_token: None,
        }
    }

    /// Set the CSRF token
    #[must_use]
    pub fn with_csrf(mut self, csrf_token: impl Into<String>) -> Self {
        self.csrf_token = Some(csrf_token.into());
        self
    }

    /// True when no token of any kind is held
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.csrf_token.is_none()
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<redacted>"
            } else {
                "<none>"
            }
        }

        f.debug_struct("CredentialRecord")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("csrf_token", &redact(&self.csrf_token))
            .finish()
    }
}

/// Result of a successful refresh exchange
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, when the server issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Rotated CSRF token taken from the response header
    #[serde(skip)]
    pub csrf_token: Option<String>,
}

impl TokenGrant {
    /// Grant carrying only an access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            csrf_token: None,
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("refresh_token_rotated", &self.refresh_token.is_some())
            .field("csrf_rotated", &self.csrf_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Where the refresh token travels on the refresh exchange
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshTokenLocation {
    /// JSON body `{"refreshToken": "..."}`
    #[default]
    Body,
    /// `Cookie: <name>=<token>` header
    Cookie {
        /// Cookie name
        #[serde(default = "default_cookie_name")]
        name: String,
    },
}

fn default_cookie_name() -> String {
    "refresh_token".to_string()
}

/// Why the session was forcibly ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// A `401` arrived and no refresh token was held
    NoRefreshToken,
    /// The refresh exchange failed
    RefreshFailed,
    /// The refresh endpoint itself answered `401`
    RefreshRejected,
    /// A request replayed with fresh credentials was still rejected
    ReplayRejected,
}

impl fmt::Display for SignOutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SignOutReason::NoRefreshToken => "no refresh token available",
            SignOutReason::RefreshFailed => "credential refresh failed",
            SignOutReason::RefreshRejected => "refresh token rejected",
            SignOutReason::ReplayRejected => "renewed credentials rejected",
        };
        f.write_str(text)
    }
}

/// Navigation callback invoked once when the session cannot be recovered
pub type SignOutHandler = Arc<dyn Fn(SignOutReason) + Send + Sync>;
