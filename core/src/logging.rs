//! Stdout subscriber for harnesses that want verbose lines printed.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber on stdout. `RUST_LOG` overrides the default
/// `info` level. Does nothing if a global subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .try_init();
}
