//! Tracing subscriber setup
//!
//! Log lines go to stderr; stdout carries the CSV report.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// The filter comes from `RUST_LOG`, falling back to `default_directive`
/// (for example `"info"`). Calling this more than once is harmless: later
/// calls leave the first subscriber in place.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
