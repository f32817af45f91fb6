//! Tracing setup for the `medimini` binary.
//!
//! Diagnostics go to stderr only. Stdout carries the schedule, conflict and
//! suggestion output that `--json` callers parse.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the subscriber with a `warn` default
///
/// Store seeding and rescheduling are logged at `info`; set `RUST_LOG=info`
/// (or `debug` for file reads and writes) to see them.
pub fn init() {
    init_with_level("warn")
}

/// Install the subscriber, using `default_level` unless `RUST_LOG` is set
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// Route detection and store logs into the test harness output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
