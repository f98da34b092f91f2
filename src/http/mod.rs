//! HTTP module
//!
//! Provides the request dispatcher and the pieces it is built from.
//!
//! # Features
//!
//! - **Credential Attachment**: bearer token and anti-forgery header per request
//! - **Single-flight Refresh**: `401`s are routed to the refresh coordinator and replayed
//! - **Automatic Retries**: transient failures retried with linear backoff or `Retry-After`
//! - **Cancellation**: every suspension point observes the request's abort signal
//! - **Throttling**: optional token bucket using governor

mod client;
mod rate_limit;
mod request;
mod response;
mod retry;
mod transport;

pub use client::{ApiClient, ApiClientBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use request::RequestDescriptor;
pub use response::ApiResponse;
pub use retry::{parse_retry_after, RetryPolicy};
pub use transport::{OutgoingRequest, ReqwestTransport, Transport};
