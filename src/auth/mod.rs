//! Authentication module
//!
//! Holds the session credentials and keeps them fresh:
//!
//! - [`CredentialStore`] owns the access, refresh and CSRF tokens
//! - [`RefreshCoordinator`] collapses concurrent `401`s into a single
//!   refresh exchange and hands the outcome to every waiting request
//! - [`HttpRefreshExchange`] performs that exchange against `/auth/refresh`

mod coordinator;
mod exchange;
mod store;
mod types;

pub use coordinator::{RefreshCoordinator, RefreshExchange, RefreshFailure, RefreshPhase};
pub use exchange::HttpRefreshExchange;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use types::{
    CredentialRecord, RefreshTokenLocation, SignOutHandler, SignOutReason, TokenGrant,
};
