//! Tracing subscriber setup for the gateway binary.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// Default level is `info`, or `debug` when the `DEBUG` environment variable
/// is set to anything non-empty; an explicit `RUST_LOG` always wins.
pub fn init() {
    let default_level = match std::env::var("DEBUG") {
        Ok(value) if !value.is_empty() => "debug",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
