//! The in-memory handle to a held lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use holdfast_core::{ClientIdentity, ObjectId};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::record::LockRecord;
use crate::registry::LockRegistry;
use crate::scope::CancelScope;
use crate::stale;
use crate::store::LockStore;

/// State shared between a guard and its refresh task: the id currently on
/// the store and the timestamp of the record behind it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LockState {
    pub id: ObjectId,
    pub time: DateTime<Utc>,
}

/// A held repository lock.
///
/// Owned by the caller that acquired it. The attached [`CancelScope`] stays
/// live exactly as long as the lock is believed held: it cancels on
/// [`unlock`](Self::unlock), on `unlock_all`, when the caller's parent scope
/// cancels, or when the refresh task declares the lock lost.
///
/// Release is one-shot; calling `unlock` again is a no-op.
pub struct LockGuard {
    record: LockRecord,
    state: Arc<Mutex<LockState>>,
    scope: CancelScope,
    store: LockStore,
    config: LockConfig,
    identity: ClientIdentity,
    refresh: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
    registry: LockRegistry,
    token: AtomicU64,
}

impl LockGuard {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        record: LockRecord,
        state: Arc<Mutex<LockState>>,
        scope: CancelScope,
        store: LockStore,
        config: LockConfig,
        identity: ClientIdentity,
        refresh: JoinHandle<()>,
        registry: LockRegistry,
    ) -> Self {
        Self {
            record,
            state,
            scope,
            store,
            config,
            identity,
            refresh: Mutex::new(Some(refresh)),
            released: AtomicBool::new(false),
            registry,
            token: AtomicU64::new(0),
        }
    }

    pub(crate) fn set_token(&self, token: u64) {
        self.token.store(token, Ordering::SeqCst);
    }

    /// The cancellation scope bound to this lock.
    #[must_use]
    pub const fn scope(&self) -> &CancelScope {
        &self.scope
    }

    /// Whether this is an exclusive claim.
    #[must_use]
    pub const fn exclusive(&self) -> bool {
        self.record.exclusive
    }

    /// The claim as originally placed.
    #[must_use]
    pub const fn record(&self) -> &LockRecord {
        &self.record
    }

    /// The id our record is currently stored under. Changes on every
    /// successful refresh.
    #[must_use]
    pub fn current_id(&self) -> ObjectId {
        self.state.lock().id
    }

    /// Whether release has been called.
    #[must_use]
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Whether our own record has gone stale, judged against the latest
    /// refreshed timestamp. Diagnostic only; a stale own lock normally means
    /// the refresh task has already cancelled the scope.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        let state = self.state.lock();
        let view = LockRecord {
            time: state.time,
            ..self.record.clone()
        };
        stale::is_stale(&view, Utc::now(), &self.config, &self.identity)
    }

    /// Release the lock: cancel the scope, stop the refresh task, remove the
    /// record from the store.
    ///
    /// Idempotent and never fails fatally; a record that cannot be removed
    /// is logged and left to age out for peers to sweep.
    pub async fn unlock(&self) {
        self.release(None).await;
    }

    pub(crate) async fn release(&self, grace: Option<Duration>) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        // The scope must read as cancelled before release returns, and the
        // refresh task must be stopped before the record goes away.
        self.scope.cancel();
        let task = self.refresh.lock().take();
        if let Some(task) = task {
            match grace {
                Some(grace) if grace.is_zero() => task.abort(),
                Some(grace) => {
                    if tokio::time::timeout(grace, task).await.is_err() {
                        debug!("refresh task did not stop within the grace period");
                    }
                }
                None => {
                    let _ = task.await;
                }
            }
        }
        let id = self.state.lock().id;
        if let Err(err) = self.store.remove(id).await {
            warn!(lock = %id.short(), error = %err, "failed to remove lock record on unlock");
        }
        self.registry.deregister(self.token.load(Ordering::SeqCst));
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released() {
            warn!(
                lock = %self.state.lock().id.short(),
                "lock guard dropped without unlock; record left for peers to sweep"
            );
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("id", &self.current_id())
            .field("exclusive", &self.exclusive())
            .field("released", &self.released())
            .finish_non_exhaustive()
    }
}
