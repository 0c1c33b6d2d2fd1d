//! Tracing subscriber initialization.
//!
//! Filters come from `RUST_LOG`; both entry points are safe to call more than once
//! (later calls are no-ops).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Process-wide JSON logging to stderr, configurable via `RUST_LOG` (default `info`).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("json tracing subscriber installed");
    }
}

/// Human-readable `debug` logging captured by the test harness.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
