//! # prodbot-telemetry
//!
//! Logging setup for the prodbot binaries and an in-memory capture layer
//! for tests.
//!
//! ```rust,no_run
//! prodbot_telemetry::init_telemetry("prodbot");
//! tracing::info!("ready");
//! ```
//!
//! Filtering follows `RUST_LOG`; without it, `info` and above are shown.

pub mod capture;

pub use capture::{CapturedEvents, EventCaptureLayer, EventData};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a human-readable subscriber.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_telemetry(service_name: &str) -> bool {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(service = service_name, "telemetry initialized");
    }
    installed
}

/// Install a subscriber that writes one JSON object per line.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_json_telemetry(service_name: &str) -> bool {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_current_span(false))
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(service = service_name, format = "json", "telemetry initialized");
    }
    installed
}

/// Install a global subscriber that also records every event into `storage`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_capture(service_name: &str, storage: CapturedEvents) -> bool {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_test_writer())
        .with(EventCaptureLayer::new(storage))
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(service = service_name, "telemetry initialized with capture");
    }
    installed
}
