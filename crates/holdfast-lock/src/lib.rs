//! Holdfast Lock - Advisory repository locking for the holdfast backup system
//!
//! Multiple independent clients, possibly on different hosts, may open the
//! same repository concurrently to read snapshots, create new ones, or prune
//! unreferenced data. This crate coordinates them with advisory lock records
//! stored in the repository itself:
//!
//! - [`LockManager`] acquires shared or exclusive locks with a caller-chosen
//!   retry budget, returning a [`LockGuard`] bound to a derived
//!   [`CancelScope`]
//! - a per-lock refresh task re-stamps the record periodically and cancels
//!   the derived scope when the record cannot be kept fresh, so a client that
//!   has lost its lock stops mutating the repository
//! - records left behind by crashed peers are detected as stale and swept
//!   during acquisition or by the maintenance operations
//!
//! # Design Principles
//!
//! 1. **Best-effort advisory locking**: the store offers only
//!    file-granularity put/list/get/remove, no compare-and-swap. Concurrent
//!    writers are resolved by a post-placement re-scan with a deterministic
//!    id tie-break; wall-clock bounds do the rest.
//! 2. **Lock liveness gates the operation**: a held lock either has a
//!    healthy refresh task or its cancellation scope has fired.
//! 3. **Records are immutable**: refresh writes a new record and removes the
//!    predecessor; nothing is updated in place.
//! 4. **No process-global state**: the registry of held locks and every
//!    timing tunable are explicit values injected through [`LockConfig`].

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod acquire;
mod config;
mod error;
mod guard;
mod manager;
mod record;
mod refresh;
mod registry;
mod scope;
mod stale;
mod store;

pub use config::*;
pub use error::*;
pub use guard::LockGuard;
pub use manager::*;
pub use record::*;
pub use registry::*;
pub use scope::*;
pub use store::*;
