//! The process-wide registry of held locks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::guard::LockGuard;

/// Registry of the locks this process currently holds.
///
/// An explicit value owned by the [`crate::LockManager`], not a global:
/// shutdown paths call `unlock_all` on the manager they own. The set is
/// small (typically one entry), so a single mutex serializes all access.
///
/// Invariant: the registry contains exactly the guards whose release has not
/// been called.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    next_token: u64,
    guards: HashMap<u64, Arc<LockGuard>>,
}

impl LockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of locks currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().guards.len()
    }

    /// Whether no locks are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().guards.is_empty()
    }

    /// Track a guard; returns the token that deregisters it.
    pub(crate) fn register(&self, guard: Arc<LockGuard>) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_token += 1;
        let token = inner.next_token;
        inner.guards.insert(token, guard);
        token
    }

    /// Stop tracking a guard. Unknown tokens are ignored.
    pub(crate) fn deregister(&self, token: u64) {
        self.inner.lock().guards.remove(&token);
    }

    /// Remove and return every tracked guard.
    pub(crate) fn drain(&self) -> Vec<Arc<LockGuard>> {
        let mut inner = self.inner.lock();
        inner.guards.drain().map(|(_, guard)| guard).collect()
    }
}
