//! Error types for storage backends.

use holdfast_core::FileHandle;
use thiserror::Error;

/// Errors surfaced by [`crate::Backend`] operations.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("object not found: {0}")]
    NotFound(FileHandle),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Whether retrying the failed operation can plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::NotFound(_) => false,
            Self::Io(_) | Self::Unavailable(_) => true,
        }
    }

    /// Whether this error reports a missing object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_core::{FileKind, ObjectId};

    #[test]
    fn not_found_is_permanent() {
        let handle = FileHandle::new(FileKind::Lock, ObjectId::hash(b"x"));
        assert!(!BackendError::NotFound(handle).is_transient());
        assert!(BackendError::NotFound(handle).is_not_found());
    }

    #[test]
    fn io_and_unavailable_are_transient() {
        assert!(BackendError::Io("connection reset".into()).is_transient());
        assert!(BackendError::Unavailable("throttled".into()).is_transient());
    }
}
