//! Structured logging init. Every component logs at well-defined points
//! (poll start/end, flush stats, slot grant/deny, breaker transitions,
//! confidence scores, triangulation enqueue) via `tracing`; this just
//! wires the subscriber once at process start.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber from an `RUST_LOG`-style
/// filter string, falling back to `level` when the environment variable
/// is unset. Safe to call once per process; subsequent calls are no-ops.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
