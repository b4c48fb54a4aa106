//! Cancellation scopes.
//!
//! A [`CancelScope`] is the signal a long-running operation watches to know
//! whether it may continue. Scopes form a tree: a child derived with
//! [`CancelScope::child`] is cancelled iff its parent cancels or a local
//! event cancels it directly. The lock manager hands callers a child scope
//! bound to the held lock; losing the lock cancels the scope, and the
//! operation aborts at its next suspension point.

use std::sync::Arc;

use tokio::sync::watch;

/// A cancellation signal shared between tasks.
///
/// Cloning yields another handle to the same scope. Cancellation is
/// one-shot and sticky: once cancelled, a scope never becomes live again.
#[derive(Debug, Clone)]
pub struct CancelScope {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelScope {
    /// Create a root scope, initially live.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the scope. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Complete when the scope is cancelled.
    ///
    /// Resolves immediately if cancellation already happened.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // We hold a sender, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Derive a child scope: cancelled iff this scope cancels or the child
    /// is cancelled directly.
    ///
    /// Must be called within a tokio runtime; propagation runs on a small
    /// background task that exits once either scope fires.
    #[must_use]
    pub fn child(&self) -> Self {
        let child = Self::new();
        let parent = self.clone();
        let forward = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = parent.cancelled() => forward.cancel(),
                () = forward.cancelled() => {}
            }
        });
        child
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
