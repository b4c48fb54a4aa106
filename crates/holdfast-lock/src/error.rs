//! Error types for lock operations.

use holdfast_core::ObjectId;
use holdfast_store::BackendError;
use thiserror::Error;

/// Errors surfaced to lock callers.
///
/// Refresh loss is deliberately absent: it is never returned from a call and
/// is observable only through cancellation of the derived scope.
#[derive(Debug, Error)]
pub enum LockError {
    /// A conflicting lock remained at the end of the retry budget.
    #[error("{}", already_locked_message(.exclusive))]
    AlreadyLocked {
        /// Whether the blocking record is an exclusive claim.
        exclusive: bool,
    },

    /// The caller's scope was cancelled during acquisition or wait.
    #[error("lock acquisition cancelled")]
    Cancelled,

    /// Object-store failure that survived the bounded internal retries.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A lock record failed to decode.
    #[error("lock record {id} is corrupt: {reason}")]
    Corrupt { id: ObjectId, reason: String },
}

// thiserror hands the field over by reference.
#[allow(clippy::trivially_copy_pass_by_ref)]
const fn already_locked_message(exclusive: &bool) -> &'static str {
    if *exclusive {
        "repository is already locked exclusively"
    } else {
        "repository is already locked"
    }
}

impl LockError {
    /// Whether this error reports a lock conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyLocked { .. })
    }
}
