//! Composable backend test doubles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use holdfast_core::{FileHandle, FileKind, ObjectId};
use holdfast_store::{Backend, BackendError};
use parking_lot::Mutex;

/// Lets the first save through and rejects every save after it.
///
/// Acquisition writes once; refresh writes again and again. Wrapping a
/// backend in this double makes every refresh fail while leaving reads and
/// removals intact.
pub struct WriteOnceBackend {
    inner: Arc<dyn Backend>,
    written: AtomicBool,
}

impl WriteOnceBackend {
    /// Wrap a backend.
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            written: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Backend for WriteOnceBackend {
    async fn save(&self, handle: FileHandle, data: Bytes) -> Result<(), BackendError> {
        if self.written.swap(true, Ordering::SeqCst) {
            return Err(BackendError::Io("save rejected after first write".into()));
        }
        self.inner.save(handle, data).await
    }

    async fn list(&self, kind: FileKind) -> Result<Vec<ObjectId>, BackendError> {
        self.inner.list(kind).await
    }

    async fn load(
        &self,
        handle: FileHandle,
        offset: u64,
        length: usize,
    ) -> Result<Bytes, BackendError> {
        self.inner.load(handle, offset, length).await
    }

    async fn stat(&self, handle: FileHandle) -> Result<u64, BackendError> {
        self.inner.stat(handle).await
    }

    async fn remove(&self, handle: FileHandle) -> Result<(), BackendError> {
        self.inner.remove(handle).await
    }
}

/// Fails chosen operation groups on demand; everything else passes through.
pub struct FailingBackend {
    inner: Arc<dyn Backend>,
    fail_saves: AtomicBool,
    fail_removes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FailingBackend {
    /// Wrap a backend; nothing fails until toggled.
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            fail_saves: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Toggle save failures.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Toggle remove failures.
    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// Toggle list/load/stat failures.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> Result<(), BackendError> {
        if flag.load(Ordering::SeqCst) {
            Err(BackendError::Io(format!("injected {op} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for FailingBackend {
    async fn save(&self, handle: FileHandle, data: Bytes) -> Result<(), BackendError> {
        self.check(&self.fail_saves, "save")?;
        self.inner.save(handle, data).await
    }

    async fn list(&self, kind: FileKind) -> Result<Vec<ObjectId>, BackendError> {
        self.check(&self.fail_reads, "list")?;
        self.inner.list(kind).await
    }

    async fn load(
        &self,
        handle: FileHandle,
        offset: u64,
        length: usize,
    ) -> Result<Bytes, BackendError> {
        self.check(&self.fail_reads, "load")?;
        self.inner.load(handle, offset, length).await
    }

    async fn stat(&self, handle: FileHandle) -> Result<u64, BackendError> {
        self.check(&self.fail_reads, "stat")?;
        self.inner.stat(handle).await
    }

    async fn remove(&self, handle: FileHandle) -> Result<(), BackendError> {
        self.check(&self.fail_removes, "remove")?;
        self.inner.remove(handle).await
    }
}

/// One recorded backend operation.
#[derive(Debug, Clone)]
pub struct RecordedOp {
    /// Operation name ("save", "list", "load", "stat", "remove").
    pub op: &'static str,
    /// Handle the operation addressed, where there is one.
    pub handle: Option<FileHandle>,
    /// When the operation started.
    pub at: Instant,
}

/// Records every operation with its timestamp, then passes it through.
pub struct RecordingBackend {
    inner: Arc<dyn Backend>,
    ops: Mutex<Vec<RecordedOp>>,
}

impl RecordingBackend {
    /// Wrap a backend.
    pub fn new(inner: Arc<dyn Backend>) -> Self {
        Self {
            inner,
            ops: Mutex::new(Vec::new()),
        }
    }

    /// All recorded operations so far.
    #[must_use]
    pub fn operations(&self) -> Vec<RecordedOp> {
        self.ops.lock().clone()
    }

    /// How many operations with the given name were recorded.
    #[must_use]
    pub fn count(&self, op: &str) -> usize {
        self.ops.lock().iter().filter(|r| r.op == op).count()
    }

    fn record(&self, op: &'static str, handle: Option<FileHandle>) {
        self.ops.lock().push(RecordedOp {
            op,
            handle,
            at: Instant::now(),
        });
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn save(&self, handle: FileHandle, data: Bytes) -> Result<(), BackendError> {
        self.record("save", Some(handle));
        self.inner.save(handle, data).await
    }

    async fn list(&self, kind: FileKind) -> Result<Vec<ObjectId>, BackendError> {
        self.record("list", None);
        self.inner.list(kind).await
    }

    async fn load(
        &self,
        handle: FileHandle,
        offset: u64,
        length: usize,
    ) -> Result<Bytes, BackendError> {
        self.record("load", Some(handle));
        self.inner.load(handle, offset, length).await
    }

    async fn stat(&self, handle: FileHandle) -> Result<u64, BackendError> {
        self.record("stat", Some(handle));
        self.inner.stat(handle).await
    }

    async fn remove(&self, handle: FileHandle) -> Result<(), BackendError> {
        self.record("remove", Some(handle));
        self.inner.remove(handle).await
    }
}

/// Adds fixed latency to every operation.
pub struct DelayBackend {
    inner: Arc<dyn Backend>,
    delay: Duration,
}

impl DelayBackend {
    /// Wrap a backend with the given per-operation delay.
    pub fn new(inner: Arc<dyn Backend>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl Backend for DelayBackend {
    async fn save(&self, handle: FileHandle, data: Bytes) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.save(handle, data).await
    }

    async fn list(&self, kind: FileKind) -> Result<Vec<ObjectId>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list(kind).await
    }

    async fn load(
        &self,
        handle: FileHandle,
        offset: u64,
        length: usize,
    ) -> Result<Bytes, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.load(handle, offset, length).await
    }

    async fn stat(&self, handle: FileHandle) -> Result<u64, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.stat(handle).await
    }

    async fn remove(&self, handle: FileHandle) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove(handle).await
    }
}
