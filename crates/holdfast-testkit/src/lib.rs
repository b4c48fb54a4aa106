//! Holdfast Test Kit - Test doubles and tracing setup for the test suites
//!
//! Backend wrappers here compose over any real [`holdfast_store::Backend`]
//! and perturb a single operation, mirroring how failures arrive in the
//! field: the store works, except for the one thing that doesn't.
//!
//! - [`WriteOnceBackend`]: the first save succeeds, every later save fails.
//!   Drives the lock-refresh failure path.
//! - [`FailingBackend`]: fail chosen operations on demand.
//! - [`RecordingBackend`]: log every operation with its timestamp.
//! - [`DelayBackend`]: add fixed latency to every operation.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod backends;
mod tracing_config;

pub use backends::*;
pub use tracing_config::*;
