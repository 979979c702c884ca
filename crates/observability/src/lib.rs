//! Process-wide tracing setup shared by every binary and test harness that
//! embeds the reversal engine.

pub mod tracing;

/// Install the JSON subscriber, filtered by `RUST_LOG` or `info`.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init_with_default("info");
}

pub use self::tracing::init_with_default;
