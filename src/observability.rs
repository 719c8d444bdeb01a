//! Tracing initialization.
//!
//! A trimmed form of the teacher's `observability::init_from_env` shape
//! (`src/observability/mod.rs`): one `EnvFilter`-driven subscriber, no
//! OTLP/Prometheus exporter machinery — this crate emits `tracing` spans
//! and `metrics` counters/histograms for a host application to collect, it
//! does not run its own collector.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{Error, Result};

/// Initializes a global `tracing` subscriber from the `RUST_LOG`
/// environment variable, falling back to `info` if unset or unparseable.
///
/// Intended for binaries and integration tests that embed this crate;
/// library code should never call this itself. Safe to call at most once
/// per process — a second call returns [`Error::OperationFailed`].
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if a global subscriber is already
/// installed.
pub fn init_from_env() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::OperationFailed {
            operation: "observability::init_from_env".to_string(),
            cause: e.to_string(),
            transient: false,
        })
}
