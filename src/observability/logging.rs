//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for hosts that want the relay's
//!   diagnostics on stderr
//! - Keep initialization idempotent so embedding never fights the host
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - Log level configurable via the `RUST_LOG` environment variable
//! - Hosts with their own subscriber simply never call this

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber honoring `RUST_LOG`, defaulting to `level`.
/// A no-op when a global subscriber is already set.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
