//! Contract-level tests for the crate's core invariants, organized one file
//! per invariant rather than per node kind.

mod cancellation;
mod ordering;
mod serialization;
mod staleness;

/// Installs an env-filtered `tracing` subscriber the first time it's
/// called, so `RUST_LOG=conduit_core=trace cargo test` surfaces the
/// per-delivery events emitted by the node machinery under test. Safe to
/// call from every test; a second install attempt is just ignored.
pub fn init_tracing() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
