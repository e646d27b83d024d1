//! Logging setup for clinrisk binaries.
//!
//! Library code only emits `tracing` events; a binary calls [`init`] once.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at WARN, overridable with `RUST_LOG`
///
/// Events go to stderr so JSON written to stdout stays machine-readable.
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Default log level (trace, debug, info, warn, error)
///
/// `RUST_LOG` still takes precedence when set.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Initialize logging for tests (captured by the test harness)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
