//! Holdfast Store - Object-store interface for the holdfast backup repository
//!
//! This crate defines the narrow capability set every storage backend must
//! provide ([`Backend`]: save/list/load/stat/remove) together with:
//!
//! - [`MemoryBackend`]: the in-memory reference implementation, used by the
//!   test suites and as the semantic model for remote backends
//! - [`RetryPolicy`]: bounded retries with exponential delay for transient
//!   backend failures
//!
//! # Design Principles
//!
//! 1. **Backends are dumb**: file-granularity put/list/get/remove, no
//!    compare-and-swap, no leases. Coordination protocols are layered above.
//! 2. **Test doubles wrap by composition**: a double takes an inner
//!    `Arc<dyn Backend>` and perturbs one operation.
//! 3. **Errors separate permanent from transient**: callers retry only what
//!    can heal.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod backend;
mod error;
mod memory;
mod retry;

pub use backend::*;
pub use error::*;
pub use memory::*;
pub use retry::*;
