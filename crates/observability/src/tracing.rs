//! Tracing subscriber initialization.

use tracing_subscriber::EnvFilter;

/// Install a JSON subscriber.
///
/// `RUST_LOG` wins when set and valid; otherwise `default_filter` (typically
/// `EngineConfig::log_filter`) is used. Returns `false` if a global
/// subscriber was already installed.
pub fn init_with_default(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init()
        .is_ok()
}
