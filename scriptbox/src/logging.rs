//! Development-time tracing for debugging the execution pipeline.
//!
//! Diagnostics only: everything goes to stderr under `RUST_LOG` control and is
//! never part of the caller-facing response. Script output and errors travel
//! through [`crate::normalize::ExecutionResponse`], not through tracing.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=scriptbox=debug scriptbox exec script.py
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
