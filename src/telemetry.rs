//! Tracing bootstrap for binaries and integration harnesses.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber with env-filter support.
///
/// Filtering follows `RUST_LOG` (default `info`). Safe to call more than
/// once; subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
