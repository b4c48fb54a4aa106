//! In-memory reference backend.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use holdfast_core::{FileHandle, FileKind, ObjectId};
use parking_lot::RwLock;

use crate::backend::Backend;
use crate::error::BackendError;

/// In-memory object store.
///
/// The semantic model for remote backends, and the substrate for the test
/// suites. Suitable for single-process use; visibility of writes is
/// immediate.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<FileHandle, Bytes>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored across all collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn save(&self, handle: FileHandle, data: Bytes) -> Result<(), BackendError> {
        self.objects.write().insert(handle, data);
        Ok(())
    }

    async fn list(&self, kind: FileKind) -> Result<Vec<ObjectId>, BackendError> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|h| h.kind == kind)
            .map(|h| h.id)
            .collect())
    }

    async fn load(
        &self,
        handle: FileHandle,
        offset: u64,
        length: usize,
    ) -> Result<Bytes, BackendError> {
        let objects = self.objects.read();
        let data = objects
            .get(&handle)
            .ok_or(BackendError::NotFound(handle))?;
        let start = usize::try_from(offset)
            .map_err(|_| BackendError::Io(format!("offset {offset} out of range")))?;
        if start > data.len() {
            return Err(BackendError::Io(format!(
                "offset {start} beyond object size {}",
                data.len()
            )));
        }
        let end = if length == 0 {
            data.len()
        } else {
            (start + length).min(data.len())
        };
        Ok(data.slice(start..end))
    }

    async fn stat(&self, handle: FileHandle) -> Result<u64, BackendError> {
        self.objects
            .read()
            .get(&handle)
            .map(|d| d.len() as u64)
            .ok_or(BackendError::NotFound(handle))
    }

    async fn remove(&self, handle: FileHandle) -> Result<(), BackendError> {
        self.objects
            .write()
            .remove(&handle)
            .map(|_| ())
            .ok_or(BackendError::NotFound(handle))
    }
}
