//! Tracing subscriber bootstrap for binaries built on the SDK.
//!
//! The library itself only emits `tracing` events. Applications that have no
//! subscriber of their own can call [`init_logging`] once at startup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Like [`init_logging`], with an explicit fallback filter.
pub fn init_logging_with(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    // Ignored when another subscriber is already installed.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
