//! Tracing configuration for test output.

use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize tracing for tests.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Uses `RUST_LOG` if set, otherwise defaults to `info` with
/// debug output for the lock crate.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,holdfast_lock=debug"));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_ansi(true)
                    .compact(),
            )
            .init();
    });
}
