//! Log output for the command line tools.
extern crate tracing_subscriber;

use tracing_subscriber::filter::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Send `tracing` events to stderr, filtered by `RUST_LOG` (default `warn`). Stdout is left to
/// the tools' own output. Calling this more than once is harmless.
pub fn initialize_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
