//! Cancellation groups and the signals they hand out

use crate::error::{Error, Result};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

const DEFAULT_REASON: &str = "aborted";

pub(crate) struct GroupInner {
    pub(crate) id: u64,
    name: String,
    token: CancellationToken,
    reason: OnceLock<String>,
}

impl GroupInner {
    pub(crate) fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` only for the call that performed the abort
    pub(crate) fn abort(&self, reason: &str) -> bool {
        // Reason is published before the token fires so observers always see it.
        let first = self.reason.set(reason.to_string()).is_ok();
        self.token.cancel();
        first
    }
}

/// Handle for a named set of requests that are cancelled together
#[derive(Clone)]
pub struct CancellationGroup {
    inner: Arc<GroupInner>,
}

impl CancellationGroup {
    pub(crate) fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                id,
                name: name.into(),
                token: CancellationToken::new(),
                reason: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<GroupInner> {
        &self.inner
    }

    /// Group name given at creation
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Signal to attach to request descriptors
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            inner: Some(self.inner.clone()),
        }
    }

    /// Abort every request associated with this group.
    ///
    /// Idempotent: only the first call has an effect and its reason wins.
    /// Returns whether this call performed the abort.
    pub fn abort(&self, reason: impl AsRef<str>) -> bool {
        let first = self.inner.abort(reason.as_ref());
        if first {
            tracing::debug!(group = %self.inner.name, reason = reason.as_ref(), "Cancellation group aborted");
        }
        first
    }

    /// Whether the group has been aborted
    pub fn is_aborted(&self) -> bool {
        self.inner.is_aborted()
    }

    /// Reason recorded by the first abort
    pub fn reason(&self) -> Option<&str> {
        self.inner.reason.get().map(String::as_str)
    }
}

impl fmt::Debug for CancellationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationGroup")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Cancellation signal carried by a request descriptor.
///
/// A default signal belongs to no group and never fires.
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Option<Arc<GroupInner>>,
}

impl AbortSignal {
    /// Signal that is never aborted
    pub fn never() -> Self {
        Self::default()
    }

    /// Whether the owning group has been aborted
    pub fn is_aborted(&self) -> bool {
        self.inner.as_ref().is_some_and(|g| g.is_aborted())
    }

    /// Abort reason, if aborted
    pub fn reason(&self) -> Option<String> {
        let inner = self.inner.as_ref()?;
        if !inner.is_aborted() {
            return None;
        }
        Some(
            inner
                .reason
                .get()
                .cloned()
                .unwrap_or_else(|| DEFAULT_REASON.to_string()),
        )
    }

    /// Resolves once the owning group is aborted
    pub async fn aborted(&self) {
        match &self.inner {
            Some(inner) => inner.token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Fail fast if already aborted
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(Error::aborted(reason)),
            None => Ok(()),
        }
    }

    /// Race a suspension point against this signal.
    ///
    /// The wrapped future is dropped (timers and pending waits included)
    /// as soon as the signal fires.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.aborted() => Err(Error::aborted(
                self.reason().unwrap_or_else(|| DEFAULT_REASON.to_string()),
            )),
            result = fut => result,
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("AbortSignal")
                .field("group", &inner.name)
                .field("aborted", &inner.is_aborted())
                .finish(),
            None => f.write_str("AbortSignal(never)"),
        }
    }
}
