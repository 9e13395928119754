//! Tracing initialization.
//!
//! Log level is driven by `RUST_LOG` (default `info`). Safe to call more
//! than once; later calls are no-ops.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for the host process.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
