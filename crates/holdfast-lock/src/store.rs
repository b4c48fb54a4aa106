//! Lock record storage through the backend.

use std::sync::Arc;

use bytes::Bytes;
use holdfast_core::{FileKind, ObjectId};
use holdfast_store::{Backend, BackendError, RetryPolicy};

use crate::error::LockError;
use crate::record::{lock_handle, LockRecord};

/// Reads and writes lock records on the object store.
///
/// Cloning is cheap; clones share the backend. Scan-path operations retry
/// transient backend failures under the configured policy; the refresh loop
/// uses [`LockStore::without_retry`] because the loop itself is the retry
/// mechanism there.
#[derive(Clone)]
pub struct LockStore {
    backend: Arc<dyn Backend>,
    retry: RetryPolicy,
}

impl LockStore {
    /// Create a store with the default retry policy.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a store with a specific retry policy.
    #[must_use]
    pub fn with_retry(backend: Arc<dyn Backend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// A clone of this store that surfaces backend errors immediately.
    #[must_use]
    pub fn without_retry(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            retry: RetryPolicy::none(),
        }
    }

    /// Serialize, hash, and write a record; returns its id.
    ///
    /// Writing a record that already exists rewrites identical bytes (the id
    /// is the content hash), so the operation is idempotent.
    ///
    /// # Errors
    /// Returns `Backend` if the write fails after retries.
    pub async fn put(&self, record: &LockRecord) -> Result<ObjectId, LockError> {
        let bytes = record
            .encode()
            .map_err(|e| BackendError::Io(format!("encode lock record: {e}")))?;
        let id = ObjectId::hash(&bytes);
        let data = Bytes::from(bytes);
        self.retry
            .run(|| self.backend.save(lock_handle(id), data.clone()))
            .await?;
        Ok(id)
    }

    /// Enumerate the ids of all current lock records.
    ///
    /// # Errors
    /// Returns `Backend` if the listing fails after retries.
    pub async fn list(&self) -> Result<Vec<ObjectId>, LockError> {
        Ok(self.retry.run(|| self.backend.list(FileKind::Lock)).await?)
    }

    /// Fetch and decode one record.
    ///
    /// # Errors
    /// Returns `Corrupt` (naming the id) if the bytes don't decode, or
    /// `Backend` if the read fails.
    pub async fn load(&self, id: ObjectId) -> Result<LockRecord, LockError> {
        let bytes = self
            .retry
            .run(|| self.backend.load(lock_handle(id), 0, 0))
            .await?;
        LockRecord::decode(&bytes).map_err(|e| LockError::Corrupt {
            id,
            reason: e.to_string(),
        })
    }

    /// Delete one record. A missing record counts as success: someone else
    /// already removed it, which is the outcome we wanted.
    ///
    /// # Errors
    /// Returns `Backend` for failures other than `NotFound`.
    pub async fn remove(&self, id: ObjectId) -> Result<(), LockError> {
        match self.retry.run(|| self.backend.remove(lock_handle(id))).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
