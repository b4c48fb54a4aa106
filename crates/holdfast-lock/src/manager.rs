//! The caller-facing lock manager.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use holdfast_core::{ClientIdentity, ObjectId};
use holdfast_store::{Backend, RetryPolicy};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::acquire;
use crate::config::LockConfig;
use crate::error::LockError;
use crate::guard::{LockGuard, LockState};
use crate::record::LockRecord;
use crate::refresh;
use crate::registry::LockRegistry;
use crate::scope::CancelScope;
use crate::stale;
use crate::store::LockStore;

/// Coordinates repository locks for one client process.
///
/// Wraps a backend, a [`LockConfig`], and the [`LockRegistry`] of locks this
/// process holds. One manager per opened repository; shutdown paths call
/// [`unlock_all`](Self::unlock_all) on it.
pub struct LockManager {
    store: LockStore,
    config: LockConfig,
    identity: ClientIdentity,
    registry: LockRegistry,
}

impl LockManager {
    /// Create a manager for the current process identity.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: LockConfig) -> Self {
        Self::with_identity(backend, config, ClientIdentity::current())
    }

    /// Create a manager claiming a specific identity. Lets tests stand in
    /// for a peer on another host.
    #[must_use]
    pub fn with_identity(
        backend: Arc<dyn Backend>,
        config: LockConfig,
        identity: ClientIdentity,
    ) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.backend_attempts,
            ..RetryPolicy::default()
        };
        Self {
            store: LockStore::with_retry(backend, retry),
            config,
            identity,
            registry: LockRegistry::new(),
        }
    }

    /// The manager's configuration.
    #[must_use]
    pub const fn config(&self) -> &LockConfig {
        &self.config
    }

    /// The registry of locks this manager holds.
    #[must_use]
    pub const fn registry(&self) -> &LockRegistry {
        &self.registry
    }

    /// Acquire a shared lock.
    ///
    /// Conflicts only with exclusive claims. Retries with backoff for up to
    /// `retry_for`; zero means fail-fast. The guard's scope derives from
    /// `scope` and cancels when the lock is released or lost.
    ///
    /// # Errors
    /// `AlreadyLocked` when a conflict outlives the retry budget,
    /// `Cancelled` when `scope` cancels first, `Backend` for store failures.
    pub async fn lock_shared(
        &self,
        scope: &CancelScope,
        retry_for: Duration,
    ) -> Result<Arc<LockGuard>, LockError> {
        self.lock(false, scope, retry_for).await
    }

    /// Acquire an exclusive lock.
    ///
    /// Conflicts with every other claim. See [`lock_shared`](Self::lock_shared).
    ///
    /// # Errors
    /// As [`lock_shared`](Self::lock_shared).
    pub async fn lock_exclusive(
        &self,
        scope: &CancelScope,
        retry_for: Duration,
    ) -> Result<Arc<LockGuard>, LockError> {
        self.lock(true, scope, retry_for).await
    }

    async fn lock(
        &self,
        exclusive: bool,
        scope: &CancelScope,
        retry_for: Duration,
    ) -> Result<Arc<LockGuard>, LockError> {
        let (record, id) = acquire::acquire(
            &self.store,
            &self.config,
            &self.identity,
            exclusive,
            retry_for,
            scope,
        )
        .await?;

        let derived = scope.child();
        let state = Arc::new(Mutex::new(LockState {
            id,
            time: record.time,
        }));
        let task = refresh::spawn(
            self.store.without_retry(),
            self.config.clone(),
            record.clone(),
            Arc::clone(&state),
            derived.clone(),
        );
        let guard = Arc::new(LockGuard::new(
            record,
            state,
            derived,
            self.store.clone(),
            self.config.clone(),
            self.identity.clone(),
            task,
            self.registry.clone(),
        ));
        let token = self.registry.register(Arc::clone(&guard));
        guard.set_token(token);
        debug!(exclusive, lock = %id.short(), "repository locked");
        Ok(guard)
    }

    /// Release every lock this process holds; returns how many.
    ///
    /// `grace` bounds how long each refresh task may take to stop (zero
    /// aborts them outright); record removal itself is best-effort.
    pub async fn unlock_all(&self, grace: Duration) -> usize {
        let guards = self.registry.drain();
        let count = guards.len();
        for guard in guards {
            guard.release(Some(grace)).await;
        }
        if count > 0 {
            info!(count, "released all repository locks");
        }
        count
    }

    /// Enumerate all lock records. Corrupt records yield `None` so a sweep
    /// over a damaged repository still reports every id.
    ///
    /// # Errors
    /// Returns `Backend` if the store cannot be read.
    pub async fn list_locks(&self) -> Result<Vec<(ObjectId, Option<LockRecord>)>, LockError> {
        let mut locks = Vec::new();
        for id in self.store.list().await? {
            match self.store.load(id).await {
                Ok(record) => locks.push((id, Some(record))),
                Err(LockError::Corrupt { id, reason }) => {
                    debug!(lock = %id, %reason, "corrupt lock record");
                    locks.push((id, None));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(locks)
    }

    /// Visit every lock record.
    ///
    /// # Errors
    /// Returns `Backend` if the store cannot be read.
    pub async fn for_each_lock<F>(&self, mut f: F) -> Result<(), LockError>
    where
        F: FnMut(ObjectId, Option<&LockRecord>),
    {
        for (id, record) in self.list_locks().await? {
            f(id, record.as_ref());
        }
        Ok(())
    }

    /// Delete every record the staleness oracle condemns; returns how many
    /// were removed.
    ///
    /// This is the repository-maintenance path behind the `unlock` command.
    /// Corrupt records are reported and left alone: an undecodable record
    /// has no trustworthy timestamp to judge against the stale age, so only
    /// [`remove_all_locks`](Self::remove_all_locks) clears them.
    ///
    /// # Errors
    /// Returns `Backend` if the store cannot be read or a removal fails for
    /// a reason other than the record already being gone.
    pub async fn remove_stale_locks(&self) -> Result<usize, LockError> {
        let now = Utc::now();
        let mut removed = 0;
        for id in self.store.list().await? {
            let condemned = match self.store.load(id).await {
                Ok(record) => stale::is_stale(&record, now, &self.config, &self.identity),
                Err(LockError::Corrupt { id, reason }) => {
                    warn!(lock = %id, %reason, "skipping corrupt lock record");
                    false
                }
                Err(err) => return Err(err),
            };
            if condemned {
                self.store.remove(id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete every lock record unconditionally; returns how many.
    ///
    /// # Errors
    /// Returns `Backend` if the store cannot be read or a removal fails.
    pub async fn remove_all_locks(&self) -> Result<usize, LockError> {
        let mut removed = 0;
        for id in self.store.list().await? {
            self.store.remove(id).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("identity", &self.identity)
            .field("held", &self.registry.len())
            .finish_non_exhaustive()
    }
}
