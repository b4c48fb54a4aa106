//! The object-store capability trait.

use async_trait::async_trait;
use bytes::Bytes;
use holdfast_core::{FileHandle, FileKind, ObjectId};

use crate::error::BackendError;

/// The capability set a storage backend provides to the repository.
///
/// Backends are shared freely across tasks; all operations take `&self`.
/// No operation is atomic across clients beyond per-object visibility: a
/// `save` becomes visible to peers' `list`/`load` at some point after it
/// returns, and nothing orders two clients' writes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Store an object under the given handle.
    ///
    /// Objects are content-addressed, so saving a handle that already exists
    /// rewrites identical bytes and succeeds.
    ///
    /// # Errors
    /// Returns an error if the object cannot be written.
    async fn save(&self, handle: FileHandle, data: Bytes) -> Result<(), BackendError>;

    /// Enumerate the ids present in a collection.
    ///
    /// # Errors
    /// Returns an error if the collection cannot be enumerated.
    async fn list(&self, kind: FileKind) -> Result<Vec<ObjectId>, BackendError>;

    /// Read `length` bytes at `offset` from an object; `length == 0` reads
    /// to the end.
    ///
    /// # Errors
    /// Returns `NotFound` if the object doesn't exist.
    async fn load(
        &self,
        handle: FileHandle,
        offset: u64,
        length: usize,
    ) -> Result<Bytes, BackendError>;

    /// Size of an object in bytes.
    ///
    /// # Errors
    /// Returns `NotFound` if the object doesn't exist.
    async fn stat(&self, handle: FileHandle) -> Result<u64, BackendError>;

    /// Delete an object.
    ///
    /// # Errors
    /// Returns `NotFound` if the object doesn't exist.
    async fn remove(&self, handle: FileHandle) -> Result<(), BackendError>;
}
