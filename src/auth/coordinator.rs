//! Single-flight credential refresh
//!
//! The first `401` observed while idle starts exactly one refresh exchange.
//! Every `401` that arrives while it is in flight joins a FIFO waiter queue
//! and receives the same outcome. State transitions happen under a mutex that
//! is never held across an await point.

use super::store::CredentialStore;
use super::types::{SignOutHandler, SignOutReason, TokenGrant};
use crate::cancel::AbortSignal;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Performs the network exchange of a refresh token for new credentials
#[async_trait]
pub trait RefreshExchange: Send + Sync {
    /// Exchange `refresh_token` for a new grant
    async fn exchange(&self, refresh_token: &str) -> Result<TokenGrant>;
}

/// Refresh state machine: `Idle -> Refreshing -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

/// Failure delivered to queued waiters when the exchange fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub message: String,
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        Error::auth_expired(failure.message)
    }
}

type Waiter = oneshot::Sender<std::result::Result<String, RefreshFailure>>;

struct RefreshState {
    phase: RefreshPhase,
    waiters: VecDeque<Waiter>,
    /// Set once a forced sign-out fired; cleared by a new login
    signed_out: bool,
    exchanges: u64,
}

/// Coordinates credential refresh for one client instance
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    store: Arc<dyn CredentialStore>,
    exchange: Arc<dyn RefreshExchange>,
    on_sign_out: Option<SignOutHandler>,
}

impl RefreshCoordinator {
    /// Create a coordinator over the given store and exchange
    pub fn new(
        store: Arc<dyn CredentialStore>,
        exchange: Arc<dyn RefreshExchange>,
        on_sign_out: Option<SignOutHandler>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState {
                phase: RefreshPhase::Idle,
                waiters: VecDeque::new(),
                signed_out: false,
                exchanges: 0,
            }),
            store,
            exchange,
            on_sign_out,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current phase
    pub fn phase(&self) -> RefreshPhase {
        self.lock().phase
    }

    /// Number of exchanges started since construction
    pub fn exchange_count(&self) -> u64 {
        self.lock().exchanges
    }

    /// Number of continuations waiting on the in-flight exchange
    pub fn pending_waiters(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Re-arm the one-shot sign-out notification after a new login
    pub fn reset(&self) {
        self.lock().signed_out = false;
    }

    /// Obtain a renewed access token after a request carrying `failed_token`
    /// was rejected with `401`.
    ///
    /// Joins the in-flight exchange if there is one, otherwise starts it.
    /// If the stored token already differs from `failed_token`, another
    /// caller refreshed in the meantime and the stored token is returned
    /// without a new exchange.
    pub async fn renew(
        self: &Arc<Self>,
        failed_token: Option<&str>,
        signal: &AbortSignal,
    ) -> Result<String> {
        signal.check()?;

        let receiver = {
            let mut state = self.lock();
            let phase = state.phase;
            match phase {
                RefreshPhase::Refreshing => {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    debug!(position = state.waiters.len(), "Joined in-flight credential refresh");
                    rx
                }
                RefreshPhase::Idle => {
                    if let Some(current) = self.store.access_token() {
                        if Some(current.as_str()) != failed_token {
                            debug!("Credentials renewed since request was sent, replaying");
                            return Ok(current);
                        }
                    }

                    let Some(refresh_token) = self.store.refresh_token() else {
                        let notify = self.end_session(&mut state);
                        drop(state);
                        warn!("Received 401 without a refresh token");
                        if notify {
                            self.notify_sign_out(SignOutReason::NoRefreshToken);
                        }
                        return Err(Error::auth_expired(SignOutReason::NoRefreshToken.to_string()));
                    };

                    state.phase = RefreshPhase::Refreshing;
                    state.exchanges += 1;
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);

                    // Detached so that aborting the initiating request does not
                    // strand the other waiters.
                    let coordinator = Arc::clone(self);
                    tokio::spawn(async move { coordinator.run_exchange(refresh_token).await });
                    debug!("Started credential refresh");
                    rx
                }
            }
        };

        signal
            .guard(async move {
                match receiver.await {
                    Ok(outcome) => outcome.map_err(Error::from),
                    Err(_) => Err(Error::auth_expired("credential refresh abandoned")),
                }
            })
            .await
    }

    async fn run_exchange(self: Arc<Self>, refresh_token: String) {
        let outcome = AssertUnwindSafe(self.exchange.exchange(&refresh_token))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Error::Other("refresh exchange panicked".to_string())));

        match outcome {
            Ok(grant) => {
                let access_token = grant.access_token;
                self.store
                    .update_tokens(access_token.clone(), grant.refresh_token);
                if let Some(csrf) = grant.csrf_token {
                    self.store.set_csrf_token(csrf);
                }

                let waiters = {
                    let mut state = self.lock();
                    state.phase = RefreshPhase::Idle;
                    std::mem::take(&mut state.waiters)
                };

                info!(waiters = waiters.len(), "Credential refresh succeeded");
                for waiter in waiters {
                    // A closed receiver means that caller was aborted.
                    let _ = waiter.send(Ok(access_token.clone()));
                }
            }
            Err(err) => {
                let (waiters, notify) = {
                    let mut state = self.lock();
                    state.phase = RefreshPhase::Idle;
                    let waiters = std::mem::take(&mut state.waiters);
                    (waiters, self.end_session(&mut state))
                };

                warn!(error = %err, waiters = waiters.len(), "Credential refresh failed");
                let reason = if matches!(err, Error::AuthExpired { .. }) {
                    SignOutReason::RefreshRejected
                } else {
                    SignOutReason::RefreshFailed
                };
                let failure = RefreshFailure {
                    message: match err {
                        Error::AuthExpired { message } => message,
                        other => format!("{}: {other}", SignOutReason::RefreshFailed),
                    },
                };
                for waiter in waiters {
                    let _ = waiter.send(Err(failure.clone()));
                }

                if notify {
                    self.notify_sign_out(reason);
                }
            }
        }
    }

    /// Clear credentials and fire the sign-out callback (once per session)
    pub fn force_sign_out(&self, reason: SignOutReason) {
        let notify = {
            let mut state = self.lock();
            self.end_session(&mut state)
        };
        warn!(%reason, "Forcing sign-out");
        if notify {
            self.notify_sign_out(reason);
        }
    }

    /// Clears credentials; returns whether the sign-out callback is still owed
    fn end_session(&self, state: &mut RefreshState) -> bool {
        self.store.clear();
        !std::mem::replace(&mut state.signed_out, true)
    }

    fn notify_sign_out(&self, reason: SignOutReason) {
        if let Some(handler) = &self.on_sign_out {
            handler(reason);
        }
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("RefreshCoordinator")
            .field("phase", &state.phase)
            .field("waiters", &state.waiters.len())
            .field("exchanges", &state.exchanges)
            .field("has_sign_out_handler", &self.on_sign_out.is_some())
            .finish()
    }
}
