// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # condo-client
//!
//! Client-side request layer for a condominium management API.
//!
//! ## Features
//!
//! - **Credential Attachment**: bearer token on every request, CSRF token on mutations
//! - **Single-flight Refresh**: concurrent `401`s share one refresh exchange and replay
//! - **Automatic Retries**: transient failures retried with backoff or `Retry-After`
//! - **Cancellation Groups**: abort every request of a screen or the whole session
//! - **Throttling**: optional client-side token bucket
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use condo_client::{ApiClient, ClientConfig, CredentialRecord, RequestDescriptor, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://condo.example.com/api")
//!         .build();
//!
//!     let client = ApiClient::builder(config)
//!         .on_sign_out(|reason| eprintln!("signed out: {reason}"))
//!         .build()?;
//!     client.login(CredentialRecord::new("access", Some("refresh".into())));
//!
//!     let page = client.create_cancellation_group("tickets-page");
//!     let tickets: serde_json::Value = client
//!         .request_json(RequestDescriptor::get("/tickets").with_signal(page.signal()))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ApiClient (dispatcher)                     │
//! │   attach credentials → send → classify → refresh / retry     │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────┬──────────────┴──────┬──────────────┬──────────┐
//! │ Credentials  │ Refresh Coordinator │ Retry Policy │ Cancel   │
//! ├──────────────┼─────────────────────┼──────────────┼──────────┤
//! │ Access token │ Idle / Refreshing   │ Linear       │ Groups   │
//! │ Refresh token│ FIFO waiter queue   │ Exponential  │ Signals  │
//! │ CSRF token   │ Sign-out callback   │ Retry-After  │ abort_all│
//! └──────────────┴─────────────────────┴──────────────┴──────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)] // TODO: Add docs before 1.0 release

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the client
pub mod error;

/// Common types and type aliases
pub mod types;

/// Credential storage and refresh coordination
pub mod auth;

/// Request dispatcher with retry and rate limiting
pub mod http;

/// Cancellation groups and abort signals
pub mod cancel;

/// Client configuration
pub mod config;

/// Command-line interface
pub mod cli;

/// Scripted transport for tests; not part of the supported API
#[doc(hidden)]
pub mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use auth::{CredentialRecord, CredentialStore, MemoryCredentialStore, SignOutReason};
pub use cancel::{AbortSignal, CancellationController, CancellationGroup};
pub use config::{load_config, load_config_from_str, ClientConfig};
pub use http::{ApiClient, ApiClientBuilder, ApiResponse, RequestDescriptor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
