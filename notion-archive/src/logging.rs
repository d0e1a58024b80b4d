//! Tracing setup for the binary: human-readable events on stderr, filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Status lines own stdout, so diagnostics go to stderr. Defaults to warnings only.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
