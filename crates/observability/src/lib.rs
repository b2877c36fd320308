//! Process-wide logging setup.
//!
//! Every service and test binary calls [`init`] once at startup; the
//! domain crates only ever emit through `tracing` macros and stay
//! subscriber-agnostic.

use tracing_subscriber::EnvFilter;

/// Initialize JSON logging filtered by `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with("info");
}

/// Like [`init`] but with an explicit fallback filter for when `RUST_LOG`
/// is unset (e.g. `"mercato_checkout=debug,info"`).
pub fn init_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
