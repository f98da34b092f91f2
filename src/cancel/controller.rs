//! Registry of live cancellation groups

use super::group::{CancellationGroup, GroupInner};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

/// Creates cancellation groups and can abort all of them at once.
///
/// Groups are tracked weakly: dropping every handle and signal of a group
/// releases it, and aborted groups are pruned.
#[derive(Default)]
pub struct CancellationController {
    next_id: AtomicU64,
    groups: Mutex<HashMap<u64, Weak<GroupInner>>>,
}

impl CancellationController {
    /// Create an empty controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new group for one logical scope
    pub fn create_group(&self, name: impl Into<String>) -> CancellationGroup {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let group = CancellationGroup::new(id, name);

        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        groups.retain(|_, weak| weak.upgrade().is_some_and(|g| !g.is_aborted()));
        groups.insert(id, Arc::downgrade(group.inner()));

        group
    }

    /// Abort a group. Idempotent; returns whether this call performed the abort.
    pub fn abort(&self, group: &CancellationGroup, reason: impl AsRef<str>) -> bool {
        let first = group.abort(reason);
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        // Ids are per controller; a group from another controller may share one.
        if groups
            .get(&group.inner().id)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(group.inner())))
        {
            groups.remove(&group.inner().id);
        }
        first
    }

    /// Abort every live group, returning how many were aborted by this call
    pub fn abort_all(&self, reason: impl AsRef<str>) -> usize {
        let live: Vec<_> = {
            let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
            groups.drain().filter_map(|(_, weak)| weak.upgrade()).collect()
        };

        let aborted = live
            .iter()
            .filter(|inner| inner.abort(reason.as_ref()))
            .count();
        debug!(aborted, reason = reason.as_ref(), "Aborted all cancellation groups");
        aborted
    }

    /// Number of groups that are alive and not yet aborted
    pub fn active_groups(&self) -> usize {
        self.groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.upgrade().is_some_and(|g| !g.is_aborted()))
            .count()
    }
}

impl std::fmt::Debug for CancellationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationController")
            .field("active_groups", &self.active_groups())
            .finish()
    }
}
