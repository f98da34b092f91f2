//! Cancellation module
//!
//! Groups abort signals per logical consumer scope (a view, a CLI command,
//! a background job). Aborting a group cancels every request carrying one of
//! its signals, including requests suspended in a backoff timer or waiting on
//! a credential refresh.
//!
//! # Usage
//!
//! ```rust,ignore
//! let group = client.create_cancellation_group("units-view");
//! let request = RequestDescriptor::get("/units").with_signal(group.signal());
//! // ... on teardown
//! group.abort("view closed");
//! ```

mod controller;
mod group;

pub use controller::CancellationController;
pub use group::{AbortSignal, CancellationGroup};
