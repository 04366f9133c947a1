//! Structured logging setup using `tracing-subscriber`.
//!
//! The engine itself only emits `tracing` events; the embedding host decides
//! where they go. [`init`] installs a reasonable console default for hosts
//! and test harnesses that have no subscriber of their own.

use tracing_subscriber::EnvFilter;

/// Initialise console logging to stderr.
///
/// Controlled by `RUST_LOG` (default: `info`). Safe to call once per
/// process; a second call is a silent no-op.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
