//! Tracing setup for the binary. Library crates only emit events; the
//! subscriber is installed here, once.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber, honoring `RUST_LOG` and defaulting to
/// warnings (the console stays silent on success).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
