//! Logging initialization.
//!
//! Uses `tracing` with `tracing-subscriber`. The level is read from
//! `RUST_LOG` (default `info`), e.g. `RUST_LOG=labor_cost_engine=debug`.

use tracing_subscriber::{EnvFilter, fmt};

/// Initializes the global subscriber for the server binary.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Initializes a debug-level subscriber that writes through the test harness.
///
/// Safe to call from several tests; only the first call installs it.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
