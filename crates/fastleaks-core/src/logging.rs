//! Shared `tracing` initialization.
//!
//! Every stage calls [`init`] once at start-up. Output is JSON, one object
//! per event, the Rust analogue of `structlog.processors.JSONRenderer()`
//! wired up identically in every Python service's `main()`.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber for a stage binary.
///
/// `service` is attached to every event as a `service` field, mirroring
/// `structlog.get_logger(service=...)`. `rust_log` seeds the `EnvFilter`;
/// pass [`crate::config::Settings::rust_log`].
pub fn init(service: &'static str, rust_log: &str) {
    let filter = EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_list(false)
        .init();

    tracing::info!(service, "logging initialized");
}
